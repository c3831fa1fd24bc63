//! Export pooling service
//!
//! Each graded-bags-pool entry is one physical export bag. Creating one
//! consumes graded stock on the item's (section, grade) key and increments
//! the export-ready count for (item, weight bucket); how much it consumes
//! depends on the bucket's unit kind. Batches commit all-or-nothing: the
//! total weight is pre-checked against the locked graded stock, and every
//! row is still re-validated by the guarded aggregate updates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger;
use crate::services::unit_kind_from_db;
use shared::ledger::{export_bag_deltas, export_consumption, ExportLedgerDelta};
use shared::models::GradedBag;
use shared::validation::validate_batch_quantity;

/// Export pooling service for graded bag pool entries
#[derive(Clone)]
pub struct ExportPoolService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct GradedBagRow {
    id: Uuid,
    import_id: Uuid,
    party_id: Uuid,
    item_id: Uuid,
    grade_id: Uuid,
    weight_id: Uuid,
    barcode: String,
    weight_override: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GradedBagRow> for GradedBag {
    fn from(row: GradedBagRow) -> Self {
        GradedBag {
            id: row.id,
            import_id: row.import_id,
            party_id: row.party_id,
            item_id: row.item_id,
            grade_id: row.grade_id,
            weight_id: row.weight_id,
            barcode: row.barcode,
            weight_override: row.weight_override,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Pool row joined with the bucket and section facts needed to reverse it.
#[derive(Debug, sqlx::FromRow)]
struct LockedBagRow {
    item_id: Uuid,
    grade_id: Uuid,
    weight_id: Uuid,
    weight_override: Option<Decimal>,
    section_id: Uuid,
    magnitude: Decimal,
    unit_kind: String,
}

/// Input for creating a batch of export bags
#[derive(Debug, Deserialize)]
pub struct CreateExportBagsInput {
    pub import_id: Uuid,
    pub party_id: Uuid,
    pub item_id: Uuid,
    pub grade_id: Uuid,
    pub weight_id: Uuid,
    pub quantity: u32,
    pub weight_override: Option<Decimal>,
}

impl ExportPoolService {
    /// Create a new ExportPoolService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a batch of export bags out of graded stock. The whole batch
    /// commits or none of it does.
    pub async fn create_bags(&self, input: CreateExportBagsInput) -> AppResult<Vec<GradedBag>> {
        validate_batch_quantity(input.quantity)
            .map_err(|m| AppError::validation("quantity", m))?;

        let mut tx = self.db.begin().await?;

        let section_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT section_id FROM items WHERE id = $1",
        )
        .bind(input.item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        let bucket = sqlx::query_as::<_, (Decimal, String)>(
            "SELECT magnitude, unit_kind FROM weights WHERE id = $1",
        )
        .bind(input.weight_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Weight".to_string()))?;
        let bucket_kind = unit_kind_from_db(&bucket.1)?;

        let grade_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM grades WHERE id = $1)")
                .bind(input.grade_id)
                .fetch_one(&mut *tx)
                .await?;
        if !grade_exists {
            return Err(AppError::NotFound("Grade".to_string()));
        }

        let party_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM parties WHERE id = $1)")
                .bind(input.party_id)
                .fetch_one(&mut *tx)
                .await?;
        if !party_exists {
            return Err(AppError::NotFound("Party".to_string()));
        }

        // Claim a contiguous barcode sequence range for the batch.
        let (code, end_seq) = sqlx::query_as::<_, (String, i64)>(
            r#"
            UPDATE imports
            SET next_export_seq = next_export_seq + $2, updated_at = now()
            WHERE id = $1
            RETURNING code, next_export_seq
            "#,
        )
        .bind(input.import_id)
        .bind(input.quantity as i64)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Import".to_string()))?;

        let consumption = export_consumption(bucket_kind, bucket.0, input.weight_override)?;
        let required = consumption.weight * Decimal::from(input.quantity);

        // Lock the graded stock row and pre-check the whole batch before
        // creating anything.
        let (available, _) =
            ledger::lock_graded_stock(&mut *tx, section_id, input.grade_id).await?;
        if required > available {
            return Err(AppError::InsufficientStock {
                required,
                available,
            });
        }

        let start = end_seq - input.quantity as i64;
        let delta = export_bag_deltas(consumption);
        let mut bags = Vec::with_capacity(input.quantity as usize);
        for i in 0..input.quantity as i64 {
            let barcode = format!("{}-E{:04}", code, start + i + 1);

            let row = sqlx::query_as::<_, GradedBagRow>(
                r#"
                INSERT INTO graded_bags_pools
                    (import_id, party_id, item_id, grade_id, weight_id, barcode, weight_override)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, import_id, party_id, item_id, grade_id, weight_id,
                          barcode, weight_override, created_at, updated_at
                "#,
            )
            .bind(input.import_id)
            .bind(input.party_id)
            .bind(input.item_id)
            .bind(input.grade_id)
            .bind(input.weight_id)
            .bind(&barcode)
            .bind(input.weight_override)
            .fetch_one(&mut *tx)
            .await?;

            apply_export_delta(&mut tx, input.item_id, input.weight_id, section_id, input.grade_id, delta)
                .await?;

            bags.push(row.into());
        }

        tx.commit().await?;

        tracing::info!(
            import_id = %input.import_id,
            item_id = %input.item_id,
            quantity = input.quantity,
            "export bag batch pooled"
        );
        Ok(bags)
    }

    /// Delete an export bag, returning its consumption to graded stock.
    pub async fn delete_bag(&self, bag_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, LockedBagRow>(
            r#"
            SELECT b.item_id, b.grade_id, b.weight_id, b.weight_override,
                   i.section_id, w.magnitude, w.unit_kind
            FROM graded_bags_pools b
            JOIN items i ON i.id = b.item_id
            JOIN weights w ON w.id = b.weight_id
            WHERE b.id = $1
            FOR UPDATE OF b
            "#,
        )
        .bind(bag_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Export bag".to_string()))?;

        let bucket_kind = unit_kind_from_db(&row.unit_kind)?;
        let consumption = export_consumption(bucket_kind, row.magnitude, row.weight_override)?;

        sqlx::query("DELETE FROM graded_bags_pools WHERE id = $1")
            .bind(bag_id)
            .execute(&mut *tx)
            .await?;

        let delta = export_bag_deltas(consumption).inverse();
        apply_export_delta(
            &mut tx,
            row.item_id,
            row.weight_id,
            row.section_id,
            row.grade_id,
            delta,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(bag_id = %bag_id, "export bag deleted");
        Ok(())
    }

    /// Get an export bag by ID
    pub async fn get_bag(&self, bag_id: Uuid) -> AppResult<GradedBag> {
        let row = sqlx::query_as::<_, GradedBagRow>(
            r#"
            SELECT id, import_id, party_id, item_id, grade_id, weight_id,
                   barcode, weight_override, created_at, updated_at
            FROM graded_bags_pools WHERE id = $1
            "#,
        )
        .bind(bag_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Export bag".to_string()))?;

        Ok(row.into())
    }

    /// List the export bags of an import
    pub async fn list_bags(&self, import_id: Uuid) -> AppResult<Vec<GradedBag>> {
        let rows = sqlx::query_as::<_, GradedBagRow>(
            r#"
            SELECT id, import_id, party_id, item_id, grade_id, weight_id,
                   barcode, weight_override, created_at, updated_at
            FROM graded_bags_pools
            WHERE import_id = $1
            ORDER BY barcode
            "#,
        )
        .bind(import_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

/// Apply an export ledger delta: the export count and the graded stock it
/// consumes (or returns).
async fn apply_export_delta(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    item_id: Uuid,
    weight_id: Uuid,
    section_id: Uuid,
    grade_id: Uuid,
    delta: ExportLedgerDelta,
) -> AppResult<()> {
    if delta.export_quantity != 0 {
        ledger::export_stock_delta(&mut **tx, item_id, weight_id, delta.export_quantity).await?;
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
