//! Import shipment and bag ledger service
//!
//! Bags are created unopened in batches under an import. Opening a bag
//! moves its weight-bucket magnitude from the unopened count into the
//! party's in-process pool; closing it again is the exact inverse. Status
//! updates compare old and new state explicitly, so a no-op update never
//! double-applies.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger;
use shared::ledger::{bag_creation_delta, bag_removal_deltas, bag_status_deltas, BagLedgerDelta};
use shared::models::{Import, ImportBag};
use shared::types::BagStatus;
use shared::validation::{validate_batch_quantity, validate_reference_code};

/// Import service for shipments and the bag ledger
#[derive(Clone)]
pub struct ImportService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ImportRow {
    id: Uuid,
    code: String,
    arrived_on: NaiveDate,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ImportRow> for Import {
    fn from(row: ImportRow) -> Self {
        Import {
            id: row.id,
            code: row.code,
            arrived_on: row.arrived_on,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BagRow {
    id: Uuid,
    import_id: Uuid,
    party_id: Uuid,
    weight_id: Uuid,
    status: String,
    barcode: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BagRow {
    fn into_model(self) -> AppResult<ImportBag> {
        let status = bag_status_from_db(&self.status)?;
        Ok(ImportBag {
            id: self.id,
            import_id: self.import_id,
            party_id: self.party_id,
            weight_id: self.weight_id,
            status,
            barcode: self.barcode,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Bag row joined with its weight-bucket magnitude, locked for ledger
/// mutations.
#[derive(Debug, sqlx::FromRow)]
struct LockedBagRow {
    id: Uuid,
    import_id: Uuid,
    party_id: Uuid,
    weight_id: Uuid,
    status: String,
    barcode: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    magnitude: Decimal,
}

fn bag_status_from_db(s: &str) -> AppResult<BagStatus> {
    BagStatus::from_str(s)
        .ok_or_else(|| AppError::IntegrityViolation(format!("unknown bag status {s:?}")))
}

/// Input for registering an import shipment
#[derive(Debug, Deserialize)]
pub struct CreateImportInput {
    pub code: String,
    pub arrived_on: NaiveDate,
    pub notes: Option<String>,
}

/// Input for creating a batch of bags under an import
#[derive(Debug, Deserialize)]
pub struct CreateBagsInput {
    pub import_id: Uuid,
    pub party_id: Uuid,
    pub weight_id: Uuid,
    pub quantity: u32,
}

impl ImportService {
    /// Create a new ImportService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register an import shipment
    pub async fn create_import(&self, input: CreateImportInput) -> AppResult<Import> {
        validate_reference_code(&input.code).map_err(|m| AppError::validation("code", m))?;

        let code_taken =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM imports WHERE code = $1)")
                .bind(&input.code)
                .fetch_one(&self.db)
                .await?;

        if code_taken {
            return Err(AppError::DuplicateEntry("import code".to_string()));
        }

        let row = sqlx::query_as::<_, ImportRow>(
            r#"
            INSERT INTO imports (code, arrived_on, notes)
            VALUES ($1, $2, $3)
            RETURNING id, code, arrived_on, notes, created_at, updated_at
            "#,
        )
        .bind(&input.code)
        .bind(input.arrived_on)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(import_id = %row.id, code = %row.code, "import registered");
        Ok(row.into())
    }

    /// Get an import by ID
    pub async fn get_import(&self, import_id: Uuid) -> AppResult<Import> {
        let row = sqlx::query_as::<_, ImportRow>(
            r#"
            SELECT id, code, arrived_on, notes, created_at, updated_at
            FROM imports WHERE id = $1
            "#,
        )
        .bind(import_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Import".to_string()))?;

        Ok(row.into())
    }

    /// List all imports, newest first
    pub async fn list_imports(&self) -> AppResult<Vec<Import>> {
        let rows = sqlx::query_as::<_, ImportRow>(
            r#"
            SELECT id, code, arrived_on, notes, created_at, updated_at
            FROM imports ORDER BY arrived_on DESC, created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Create a batch of unopened bags under an import. All-or-nothing:
    /// the bag rows and their import stock contributions commit together.
    pub async fn create_bags(&self, input: CreateBagsInput) -> AppResult<Vec<ImportBag>> {
        validate_batch_quantity(input.quantity)
            .map_err(|m| AppError::validation("quantity", m))?;

        let mut tx = self.db.begin().await?;

        // Claim a contiguous barcode sequence range for the batch.
        let (code, end_seq) = sqlx::query_as::<_, (String, i64)>(
            r#"
            UPDATE imports
            SET next_bag_seq = next_bag_seq + $2, updated_at = now()
            WHERE id = $1
            RETURNING code, next_bag_seq
            "#,
        )
        .bind(input.import_id)
        .bind(input.quantity as i64)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Import".to_string()))?;

        let party_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM parties WHERE id = $1)")
                .bind(input.party_id)
                .fetch_one(&mut *tx)
                .await?;
        if !party_exists {
            return Err(AppError::NotFound("Party".to_string()));
        }

        let weight_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM weights WHERE id = $1)")
                .bind(input.weight_id)
                .fetch_one(&mut *tx)
                .await?;
        if !weight_exists {
            return Err(AppError::NotFound("Weight".to_string()));
        }

        let start = end_seq - input.quantity as i64;
        let mut bags = Vec::with_capacity(input.quantity as usize);
        for i in 0..input.quantity as i64 {
            let barcode = format!("{}-B{:04}", code, start + i + 1);

            let row = sqlx::query_as::<_, BagRow>(
                r#"
                INSERT INTO import_bags (import_id, party_id, weight_id, status, barcode)
                VALUES ($1, $2, $3, 'unopened', $4)
                RETURNING id, import_id, party_id, weight_id, status, barcode,
                          created_at, updated_at
                "#,
            )
            .bind(input.import_id)
            .bind(input.party_id)
            .bind(input.weight_id)
            .bind(&barcode)
            .fetch_one(&mut *tx)
            .await?;

            apply_bag_delta(
                &mut tx,
                input.party_id,
                input.weight_id,
                bag_creation_delta(),
            )
            .await?;

            bags.push(row.into_model()?);
        }

        tx.commit().await?;

        tracing::info!(
            import_id = %input.import_id,
            party_id = %input.party_id,
            quantity = input.quantity,
            "bag batch created"
        );
        Ok(bags)
    }

    /// Update a bag's status, moving its stock contribution between the
    /// unopened count and the in-process pool. Setting the current status
    /// again is a no-op and leaves all aggregates unchanged.
    pub async fn set_bag_status(
        &self,
        bag_id: Uuid,
        new_status: BagStatus,
    ) -> AppResult<ImportBag> {
        let mut tx = self.db.begin().await?;

        let row = self.lock_bag(&mut tx, bag_id).await?;
        let old_status = bag_status_from_db(&row.status)?;

        let Some(delta) = bag_status_deltas(old_status, new_status, row.magnitude) else {
            tx.commit().await?;
            return Ok(ImportBag {
                id: row.id,
                import_id: row.import_id,
                party_id: row.party_id,
                weight_id: row.weight_id,
                status: old_status,
                barcode: row.barcode,
                created_at: row.created_at,
                updated_at: row.updated_at,
            });
        };

        let updated = sqlx::query_as::<_, BagRow>(
            r#"
            UPDATE import_bags
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, import_id, party_id, weight_id, status, barcode,
                      created_at, updated_at
            "#,
        )
        .bind(bag_id)
        .bind(new_status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        apply_bag_delta(&mut tx, row.party_id, row.weight_id, delta).await?;

        tx.commit().await?;

        tracing::info!(
            bag_id = %bag_id,
            from = old_status.as_str(),
            to = new_status.as_str(),
            "bag status changed"
        );
        updated.into_model()
    }

    /// Delete a bag, reversing exactly the stock it was contributing.
    pub async fn delete_bag(&self, bag_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let row = self.lock_bag(&mut tx, bag_id).await?;
        let status = bag_status_from_db(&row.status)?;

        sqlx::query("DELETE FROM import_bags WHERE id = $1")
            .bind(bag_id)
            .execute(&mut *tx)
            .await?;

        let delta = bag_removal_deltas(status, row.magnitude);
        apply_bag_delta(&mut tx, row.party_id, row.weight_id, delta).await?;

        tx.commit().await?;

        tracing::info!(bag_id = %bag_id, status = status.as_str(), "bag deleted");
        Ok(())
    }

    /// Get a bag by ID
    pub async fn get_bag(&self, bag_id: Uuid) -> AppResult<ImportBag> {
        let row = sqlx::query_as::<_, BagRow>(
            r#"
            SELECT id, import_id, party_id, weight_id, status, barcode,
                   created_at, updated_at
            FROM import_bags WHERE id = $1
            "#,
        )
        .bind(bag_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Import bag".to_string()))?;

        row.into_model()
    }

    /// List the bags of an import
    pub async fn list_bags(&self, import_id: Uuid) -> AppResult<Vec<ImportBag>> {
        let rows = sqlx::query_as::<_, BagRow>(
            r#"
            SELECT id, import_id, party_id, weight_id, status, barcode,
                   created_at, updated_at
            FROM import_bags
            WHERE import_id = $1
            ORDER BY barcode
            "#,
        )
        .bind(import_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(|r| r.into_model()).collect()
    }

    /// Lock a bag row together with its weight-bucket magnitude. A bag
    /// whose weight row is gone indicates referential corruption.
    async fn lock_bag(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        bag_id: Uuid,
    ) -> AppResult<LockedBagRow> {
        sqlx::query_as::<_, LockedBagRow>(
            r#"
            SELECT b.id, b.import_id, b.party_id, b.weight_id, b.status, b.barcode,
                   b.created_at, b.updated_at, w.magnitude
            FROM import_bags b
            JOIN weights w ON w.id = b.weight_id
            WHERE b.id = $1
            FOR UPDATE OF b
            "#,
        )
        .bind(bag_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Import bag".to_string()))
    }
}

/// Apply a bag ledger delta, skipping zero components.
async fn apply_bag_delta(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    party_id: Uuid,
    weight_id: Uuid,
    delta: BagLedgerDelta,
) -> AppResult<()> {
    if delta.import_quantity != 0 {
        ledger::import_stock_delta(&mut **tx, party_id, weight_id, delta.import_quantity).await?;
    }
    if !delta.in_process_weight.is_zero() {
        ledger::in_process_delta(&mut **tx, party_id, delta.in_process_weight).await?;
    }
    Ok(())
}
