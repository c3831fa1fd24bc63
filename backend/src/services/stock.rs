//! Stock query service
//!
//! Read-only surface over the four aggregate tables, plus the availability
//! checks the controller layer uses to validate requests up front. Reads
//! reflect the latest committed ledger state; the authoritative re-check
//! happens inside the writing transactions.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::ledger::shortage;
use shared::models::{AvailabilityCheck, ExportStock, GradedStock, ImportStock, InProcessStock};

/// Stock query service
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ImportStockRow {
    party_id: Uuid,
    weight_id: Uuid,
    quantity: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct GradedStockRow {
    section_id: Uuid,
    grade_id: Uuid,
    weight: Decimal,
    pair: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ExportStockRow {
    item_id: Uuid,
    weight_id: Uuid,
    quantity: i64,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get the unopened-bag count for (party, weight)
    pub async fn get_import_stock(
        &self,
        party_id: Uuid,
        weight_id: Uuid,
    ) -> AppResult<ImportStock> {
        let row = sqlx::query_as::<_, ImportStockRow>(
            r#"
            SELECT party_id, weight_id, quantity
            FROM import_stocks
            WHERE party_id = $1 AND weight_id = $2
            "#,
        )
        .bind(party_id)
        .bind(weight_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Import stock".to_string()))?;

        Ok(ImportStock {
            party_id: row.party_id,
            weight_id: row.weight_id,
            quantity: row.quantity,
        })
    }

    /// List the import stock rows of a party
    pub async fn list_import_stocks(&self, party_id: Uuid) -> AppResult<Vec<ImportStock>> {
        let rows = sqlx::query_as::<_, ImportStockRow>(
            r#"
            SELECT s.party_id, s.weight_id, s.quantity
            FROM import_stocks s
            JOIN weights w ON w.id = s.weight_id
            WHERE s.party_id = $1
            ORDER BY w.magnitude
            "#,
        )
        .bind(party_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ImportStock {
                party_id: r.party_id,
                weight_id: r.weight_id,
                quantity: r.quantity,
            })
            .collect())
    }

    /// Get the opened in-process weight of a party
    pub async fn get_in_process_stock(&self, party_id: Uuid) -> AppResult<InProcessStock> {
        let weight = sqlx::query_scalar::<_, Decimal>(
            "SELECT weight FROM in_process_stocks WHERE party_id = $1",
        )
        .bind(party_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("In-process stock".to_string()))?;

        Ok(InProcessStock { party_id, weight })
    }

    /// Get the graded stock for (section, grade)
    pub async fn get_graded_stock(
        &self,
        section_id: Uuid,
        grade_id: Uuid,
    ) -> AppResult<GradedStock> {
        let row = sqlx::query_as::<_, GradedStockRow>(
            r#"
            SELECT section_id, grade_id, weight, pair
            FROM graded_stocks
            WHERE section_id = $1 AND grade_id = $2
            "#,
        )
        .bind(section_id)
        .bind(grade_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Graded stock".to_string()))?;

        Ok(GradedStock {
            section_id: row.section_id,
            grade_id: row.grade_id,
            weight: row.weight,
            pair: row.pair,
        })
    }

    /// List the graded stock rows of a section
    pub async fn list_graded_stocks(&self, section_id: Uuid) -> AppResult<Vec<GradedStock>> {
        let rows = sqlx::query_as::<_, GradedStockRow>(
            r#"
            SELECT section_id, grade_id, weight, pair
            FROM graded_stocks
            WHERE section_id = $1
            ORDER BY grade_id
            "#,
        )
        .bind(section_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| GradedStock {
                section_id: r.section_id,
                grade_id: r.grade_id,
                weight: r.weight,
                pair: r.pair,
            })
            .collect())
    }

    /// Get the export-ready count for (item, weight)
    pub async fn get_export_stock(&self, item_id: Uuid, weight_id: Uuid) -> AppResult<ExportStock> {
        let row = sqlx::query_as::<_, ExportStockRow>(
            r#"
            SELECT item_id, weight_id, quantity
            FROM export_stocks
            WHERE item_id = $1 AND weight_id = $2
            "#,
        )
        .bind(item_id)
        .bind(weight_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Export stock".to_string()))?;

        Ok(ExportStock {
            item_id: row.item_id,
            weight_id: row.weight_id,
            quantity: row.quantity,
        })
    }

    /// List the export stock rows of an item
    pub async fn list_export_stocks(&self, item_id: Uuid) -> AppResult<Vec<ExportStock>> {
        let rows = sqlx::query_as::<_, ExportStockRow>(
            r#"
            SELECT s.item_id, s.weight_id, s.quantity
            FROM export_stocks s
            JOIN weights w ON w.id = s.weight_id
            WHERE s.item_id = $1
            ORDER BY w.magnitude
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ExportStock {
                item_id: r.item_id,
                weight_id: r.weight_id,
                quantity: r.quantity,
            })
            .collect())
    }

    /// Graded weight available for export pooling of an item at a grade:
    /// the (section-of-item, grade) stock weight.
    pub async fn available_weight(&self, item_id: Uuid, grade_id: Uuid) -> AppResult<Decimal> {
        let weight = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT gs.weight
            FROM graded_stocks gs
            JOIN items i ON i.section_id = gs.section_id
            WHERE i.id = $1 AND gs.grade_id = $2
            "#,
        )
        .bind(item_id)
        .bind(grade_id)
        .fetch_optional(&self.db)
        .await?;

        match weight {
            Some(w) => Ok(w),
            None => {
                let item_exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM items WHERE id = $1)",
                )
                .bind(item_id)
                .fetch_one(&self.db)
                .await?;
                if !item_exists {
                    return Err(AppError::NotFound("Item".to_string()));
                }

                let grade_exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM grades WHERE id = $1)",
                )
                .bind(grade_id)
                .fetch_one(&self.db)
                .await?;
                if !grade_exists {
                    return Err(AppError::NotFound("Grade".to_string()));
                }

                // Both dimensions exist, so seeding should have produced
                // the row.
                Err(AppError::IntegrityViolation(format!(
                    "graded stock row missing for item {item_id} / grade {grade_id}"
                )))
            }
        }
    }

    /// Structured availability check for an export pooling request: the
    /// shortage is reported instead of a plain yes/no.
    pub async fn check_availability(
        &self,
        item_id: Uuid,
        grade_id: Uuid,
        required: Decimal,
    ) -> AppResult<AvailabilityCheck> {
        let available = self.available_weight(item_id, grade_id).await?;
        Ok(AvailabilityCheck {
            required,
            available,
            shortage: shortage(required, available),
        })
    }

    /// Opened weight a grading entry for (import, party) may still claim.
    /// Committed grading already nets out of the in-process aggregate, so
    /// the aggregate itself is the binding bound.
    pub async fn available_opened_weight(
        &self,
        import_id: Uuid,
        party_id: Uuid,
    ) -> AppResult<Decimal> {
        let import_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM imports WHERE id = $1)")
                .bind(import_id)
                .fetch_one(&self.db)
                .await?;
        if !import_exists {
            return Err(AppError::NotFound("Import".to_string()));
        }

        let weight = sqlx::query_scalar::<_, Decimal>(
            "SELECT weight FROM in_process_stocks WHERE party_id = $1",
        )
        .bind(party_id)
        .fetch_optional(&self.db)
        .await?;

        match weight {
            Some(w) => Ok(w),
            None => {
                let party_exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM parties WHERE id = $1)",
                )
                .bind(party_id)
                .fetch_one(&self.db)
                .await?;
                if !party_exists {
                    return Err(AppError::NotFound("Party".to_string()));
                }
                Err(AppError::IntegrityViolation(format!(
                    "in-process stock row missing for party {party_id}"
                )))
            }
        }
    }
}
