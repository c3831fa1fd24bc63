//! Grading ledger service
//!
//! A grading entry consumes opened in-process weight from a party and
//! produces graded stock on a (section, grade) key. Sections account in
//! kilograms or in pairs; pair-kind sections book an auxiliary pair count
//! alongside the weight. Updates apply the old→new difference, deletes the
//! exact inverse of the create.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger;
use crate::services::unit_kind_from_db;
use shared::ledger::{grading_deltas, grading_revision_deltas, GradingLedgerDelta};
use shared::models::GradedItem;
use shared::validation::{validate_grading_pair, validate_positive_weight};

/// Grading service for graded item pool entries
#[derive(Clone)]
pub struct GradingService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct GradedItemRow {
    id: Uuid,
    party_id: Uuid,
    import_id: Uuid,
    section_id: Uuid,
    grade_id: Uuid,
    weight: Decimal,
    pair: i64,
    graded_at: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GradedItemRow> for GradedItem {
    fn from(row: GradedItemRow) -> Self {
        GradedItem {
            id: row.id,
            party_id: row.party_id,
            import_id: row.import_id,
            section_id: row.section_id,
            grade_id: row.grade_id,
            weight: row.weight,
            pair: row.pair,
            graded_at: row.graded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Entry row joined with its section's unit kind, locked for revision.
#[derive(Debug, sqlx::FromRow)]
struct LockedEntryRow {
    party_id: Uuid,
    section_id: Uuid,
    grade_id: Uuid,
    weight: Decimal,
    pair: i64,
    graded_at: NaiveDate,
    unit_kind: String,
}

/// Input for recording a grading entry
#[derive(Debug, Deserialize)]
pub struct CreateGradedItemInput {
    pub party_id: Uuid,
    pub import_id: Uuid,
    pub section_id: Uuid,
    pub grade_id: Uuid,
    pub weight: Decimal,
    pub pair: Option<i64>,
    pub graded_at: Option<NaiveDate>,
}

/// Input for revising a grading entry
#[derive(Debug, Deserialize)]
pub struct UpdateGradedItemInput {
    pub weight: Option<Decimal>,
    pub pair: Option<i64>,
    pub graded_at: Option<NaiveDate>,
}

impl GradingService {
    /// Create a new GradingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a grading entry, moving weight from the party's opened pool
    /// into (section, grade) stock.
    pub async fn create_entry(&self, input: CreateGradedItemInput) -> AppResult<GradedItem> {
        validate_positive_weight(input.weight).map_err(|m| AppError::validation("weight", m))?;

        let mut tx = self.db.begin().await?;

        let section_kind = sqlx::query_scalar::<_, String>(
            "SELECT unit_kind FROM sections WHERE id = $1",
        )
        .bind(input.section_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Section".to_string()))?;
        let section_kind = unit_kind_from_db(&section_kind)?;

        let pair = validate_grading_pair(section_kind, input.pair)
            .map_err(|m| AppError::validation("pair", m))?;

        self.ensure_exists(&mut tx, "grades", "Grade", input.grade_id)
            .await?;
        self.ensure_exists(&mut tx, "imports", "Import", input.import_id)
            .await?;
        self.ensure_exists(&mut tx, "parties", "Party", input.party_id)
            .await?;

        // Lock the party's opened pool; the check below stays authoritative
        // until commit.
        let available = ledger::lock_in_process_weight(&mut *tx, input.party_id).await?;
        if input.weight > available {
            return Err(AppError::InsufficientStock {
                required: input.weight,
                available,
            });
        }

        let graded_at = input.graded_at.unwrap_or_else(|| Utc::now().date_naive());

        let row = sqlx::query_as::<_, GradedItemRow>(
            r#"
            INSERT INTO graded_items_pools
                (party_id, import_id, section_id, grade_id, weight, pair, graded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, party_id, import_id, section_id, grade_id, weight, pair,
                      graded_at, created_at, updated_at
            "#,
        )
        .bind(input.party_id)
        .bind(input.import_id)
        .bind(input.section_id)
        .bind(input.grade_id)
        .bind(input.weight)
        .bind(pair)
        .bind(graded_at)
        .fetch_one(&mut *tx)
        .await?;

        let delta = grading_deltas(section_kind, input.weight, pair);
        apply_grading_delta(
            &mut tx,
            input.party_id,
            input.section_id,
            input.grade_id,
            delta,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            entry_id = %row.id,
            party_id = %input.party_id,
            weight = %input.weight,
            "grading entry recorded"
        );
        Ok(row.into())
    }

    /// Revise a grading entry; the aggregates receive the old→new
    /// difference only.
    pub async fn update_entry(
        &self,
        entry_id: Uuid,
        input: UpdateGradedItemInput,
    ) -> AppResult<GradedItem> {
        let mut tx = self.db.begin().await?;

        let old = self.lock_entry(&mut tx, entry_id).await?;
        let section_kind = unit_kind_from_db(&old.unit_kind)?;

        let new_weight = input.weight.unwrap_or(old.weight);
        validate_positive_weight(new_weight).map_err(|m| AppError::validation("weight", m))?;

        let new_pair = validate_grading_pair(section_kind, input.pair.or(Some(old.pair)))
            .map_err(|m| AppError::validation("pair", m))?;

        let graded_at = input.graded_at.unwrap_or(old.graded_at);

        // A larger claim must still fit into the party's opened pool.
        let claim_increase = new_weight - old.weight;
        if claim_increase > Decimal::ZERO {
            let available = ledger::lock_in_process_weight(&mut *tx, old.party_id).await?;
            if claim_increase > available {
                return Err(AppError::InsufficientStock {
                    required: claim_increase,
                    available,
                });
            }
        }

        let row = sqlx::query_as::<_, GradedItemRow>(
            r#"
            UPDATE graded_items_pools
            SET weight = $2, pair = $3, graded_at = $4, updated_at = now()
            WHERE id = $1
            RETURNING id, party_id, import_id, section_id, grade_id, weight, pair,
                      graded_at, created_at, updated_at
            "#,
        )
        .bind(entry_id)
        .bind(new_weight)
        .bind(new_pair)
        .bind(graded_at)
        .fetch_one(&mut *tx)
        .await?;

        let delta =
            grading_revision_deltas(section_kind, old.weight, old.pair, new_weight, new_pair);
        apply_grading_delta(&mut tx, old.party_id, old.section_id, old.grade_id, delta).await?;

        tx.commit().await?;

        tracing::info!(entry_id = %entry_id, "grading entry revised");
        Ok(row.into())
    }

    /// Delete a grading entry, returning its weight to the party's opened
    /// pool. Graded stock already consumed by export pooling surfaces as a
    /// stock conflict.
    pub async fn delete_entry(&self, entry_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let old = self.lock_entry(&mut tx, entry_id).await?;
        let section_kind = unit_kind_from_db(&old.unit_kind)?;

        sqlx::query("DELETE FROM graded_items_pools WHERE id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        let delta = grading_deltas(section_kind, old.weight, old.pair).inverse();
        apply_grading_delta(&mut tx, old.party_id, old.section_id, old.grade_id, delta).await?;

        tx.commit().await?;

        tracing::info!(entry_id = %entry_id, "grading entry deleted");
        Ok(())
    }

    /// Get a grading entry by ID
    pub async fn get_entry(&self, entry_id: Uuid) -> AppResult<GradedItem> {
        let row = sqlx::query_as::<_, GradedItemRow>(
            r#"
            SELECT id, party_id, import_id, section_id, grade_id, weight, pair,
                   graded_at, created_at, updated_at
            FROM graded_items_pools WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Grading entry".to_string()))?;

        Ok(row.into())
    }

    /// List all grading entries, newest first
    pub async fn list_entries(&self) -> AppResult<Vec<GradedItem>> {
        let rows = sqlx::query_as::<_, GradedItemRow>(
            r#"
            SELECT id, party_id, import_id, section_id, grade_id, weight, pair,
                   graded_at, created_at, updated_at
            FROM graded_items_pools
            ORDER BY graded_at DESC, created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// List the grading entries of an import
    pub async fn list_entries_for_import(&self, import_id: Uuid) -> AppResult<Vec<GradedItem>> {
        let rows = sqlx::query_as::<_, GradedItemRow>(
            r#"
            SELECT id, party_id, import_id, section_id, grade_id, weight, pair,
                   graded_at, created_at, updated_at
            FROM graded_items_pools
            WHERE import_id = $1
            ORDER BY graded_at DESC, created_at DESC
            "#,
        )
        .bind(import_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn lock_entry(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        entry_id: Uuid,
    ) -> AppResult<LockedEntryRow> {
        sqlx::query_as::<_, LockedEntryRow>(
            r#"
            SELECT g.party_id, g.section_id, g.grade_id,
                   g.weight, g.pair, g.graded_at, s.unit_kind
            FROM graded_items_pools g
            JOIN sections s ON s.id = g.section_id
            WHERE g.id = $1
            FOR UPDATE OF g
            "#,
        )
        .bind(entry_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Grading entry".to_string()))
    }

    async fn ensure_exists(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        table: &str,
        resource: &str,
        id: Uuid,
    ) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            table
        ))
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

        if !exists {
            return Err(AppError::NotFound(resource.to_string()));
        }
        Ok(())
    }
}

/// Apply a grading ledger delta, skipping zero components.
async fn apply_grading_delta(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    party_id: Uuid,
    section_id: Uuid,
    grade_id: Uuid,
    delta: GradingLedgerDelta,
) -> AppResult<()> {
    if !delta.in_process_weight.is_zero() {
        ledger::in_process_delta(&mut **tx, party_id, delta.in_process_weight).await?;
    }
    if !delta.graded_weight.is_zero() || delta.graded_pair != 0 {
        ledger::graded_stock_delta(
            &mut **tx,
            section_id,
            grade_id,
            delta.graded_weight,
            delta.graded_pair,
        )
        .await?;
    }
    Ok(())
}
