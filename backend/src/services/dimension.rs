//! Dimension (reference data) service
//!
//! Creating a dimension row also materializes the zero-valued aggregate
//! rows its combinations require, in the same transaction: later deltas
//! can then rely on a plain `UPDATE ... WHERE key`. If seeding fails, the
//! dimension insert rolls back with it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger;
use crate::services::unit_kind_from_db;
use shared::models::{Grade, Item, Party, Section, Weight};
use shared::types::UnitKind;
use shared::validation::{validate_name, validate_positive_weight};

/// Dimension service for parties, weights, sections, items and grades
#[derive(Clone)]
pub struct DimensionService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct PartyRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PartyRow> for Party {
    fn from(row: PartyRow) -> Self {
        Party {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WeightRow {
    id: Uuid,
    label: String,
    magnitude: Decimal,
    unit_kind: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WeightRow {
    fn into_model(self) -> AppResult<Weight> {
        Ok(Weight {
            id: self.id,
            label: self.label,
            magnitude: self.magnitude,
            unit_kind: unit_kind_from_db(&self.unit_kind)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SectionRow {
    id: Uuid,
    name: String,
    unit_kind: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SectionRow {
    fn into_model(self) -> AppResult<Section> {
        Ok(Section {
            id: self.id,
            name: self.name,
            unit_kind: unit_kind_from_db(&self.unit_kind)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    name: String,
    section_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            name: row.name,
            section_id: row.section_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GradeRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GradeRow> for Grade {
    fn from(row: GradeRow) -> Self {
        Grade {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for creating a party
#[derive(Debug, Deserialize)]
pub struct CreatePartyInput {
    pub name: String,
}

/// Input for creating a weight bucket
#[derive(Debug, Deserialize)]
pub struct CreateWeightInput {
    pub label: String,
    pub magnitude: Decimal,
    pub unit_kind: UnitKind,
}

/// Input for creating a section
#[derive(Debug, Deserialize)]
pub struct CreateSectionInput {
    pub name: String,
    pub unit_kind: UnitKind,
}

/// Input for creating an item
#[derive(Debug, Deserialize)]
pub struct CreateItemInput {
    pub name: String,
    pub section_id: Uuid,
}

/// Input for creating a grade
#[derive(Debug, Deserialize)]
pub struct CreateGradeInput {
    pub name: String,
}

impl DimensionService {
    /// Create a new DimensionService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a party and seed its aggregate rows
    pub async fn create_party(&self, input: CreatePartyInput) -> AppResult<Party> {
        validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, PartyRow>(
            r#"
            INSERT INTO parties (name)
            VALUES ($1)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .fetch_one(&mut *tx)
        .await?;

        ledger::seed_party(&mut *tx, row.id).await?;

        tx.commit().await?;

        tracing::info!(party_id = %row.id, "party created and stock rows seeded");
        Ok(row.into())
    }

    /// Create a weight bucket and seed its aggregate rows
    pub async fn create_weight(&self, input: CreateWeightInput) -> AppResult<Weight> {
        validate_name(&input.label).map_err(|m| AppError::validation("label", m))?;
        validate_positive_weight(input.magnitude)
            .map_err(|m| AppError::validation("magnitude", m))?;

        if input.unit_kind == UnitKind::Pair && !input.magnitude.fract().is_zero() {
            return Err(AppError::validation(
                "magnitude",
                "Pair-kind bucket magnitude must be a whole pair count",
            ));
        }

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, WeightRow>(
            r#"
            INSERT INTO weights (label, magnitude, unit_kind)
            VALUES ($1, $2, $3)
            RETURNING id, label, magnitude, unit_kind, created_at, updated_at
            "#,
        )
        .bind(&input.label)
        .bind(input.magnitude)
        .bind(input.unit_kind.as_str())
        .fetch_one(&mut *tx)
        .await?;

        ledger::seed_weight(&mut *tx, row.id).await?;

        tx.commit().await?;

        tracing::info!(weight_id = %row.id, "weight bucket created and stock rows seeded");
        row.into_model()
    }

    /// Create a section and seed its graded stock rows
    pub async fn create_section(&self, input: CreateSectionInput) -> AppResult<Section> {
        validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, SectionRow>(
            r#"
            INSERT INTO sections (name, unit_kind)
            VALUES ($1, $2)
            RETURNING id, name, unit_kind, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(input.unit_kind.as_str())
        .fetch_one(&mut *tx)
        .await?;

        ledger::seed_section(&mut *tx, row.id).await?;

        tx.commit().await?;

        tracing::info!(section_id = %row.id, "section created and stock rows seeded");
        row.into_model()
    }

    /// Create an item and seed its aggregate rows
    pub async fn create_item(&self, input: CreateItemInput) -> AppResult<Item> {
        validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;

        let section_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM sections WHERE id = $1)")
                .bind(input.section_id)
                .fetch_one(&self.db)
                .await?;

        if !section_exists {
            return Err(AppError::NotFound("Section".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            INSERT INTO items (name, section_id)
            VALUES ($1, $2)
            RETURNING id, name, section_id, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(input.section_id)
        .fetch_one(&mut *tx)
        .await?;

        ledger::seed_item(&mut *tx, row.id, row.section_id).await?;

        tx.commit().await?;

        tracing::info!(item_id = %row.id, "item created and stock rows seeded");
        Ok(row.into())
    }

    /// Create a grade and seed its graded stock rows
    pub async fn create_grade(&self, input: CreateGradeInput) -> AppResult<Grade> {
        validate_name(&input.name).map_err(|m| AppError::validation("name", m))?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, GradeRow>(
            r#"
            INSERT INTO grades (name)
            VALUES ($1)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .fetch_one(&mut *tx)
        .await?;

        ledger::seed_grade(&mut *tx, row.id).await?;

        tx.commit().await?;

        tracing::info!(grade_id = %row.id, "grade created and stock rows seeded");
        Ok(row.into())
    }

    /// Get a party by ID
    pub async fn get_party(&self, party_id: Uuid) -> AppResult<Party> {
        let row = sqlx::query_as::<_, PartyRow>(
            "SELECT id, name, created_at, updated_at FROM parties WHERE id = $1",
        )
        .bind(party_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Party".to_string()))?;

        Ok(row.into())
    }

    /// List all parties
    pub async fn list_parties(&self) -> AppResult<Vec<Party>> {
        let rows = sqlx::query_as::<_, PartyRow>(
            "SELECT id, name, created_at, updated_at FROM parties ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Get a weight bucket by ID
    pub async fn get_weight(&self, weight_id: Uuid) -> AppResult<Weight> {
        let row = sqlx::query_as::<_, WeightRow>(
            r#"
            SELECT id, label, magnitude, unit_kind, created_at, updated_at
            FROM weights WHERE id = $1
            "#,
        )
        .bind(weight_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Weight".to_string()))?;

        row.into_model()
    }

    /// List all weight buckets
    pub async fn list_weights(&self) -> AppResult<Vec<Weight>> {
        let rows = sqlx::query_as::<_, WeightRow>(
            r#"
            SELECT id, label, magnitude, unit_kind, created_at, updated_at
            FROM weights ORDER BY magnitude
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(|r| r.into_model()).collect()
    }

    /// Get a section by ID
    pub async fn get_section(&self, section_id: Uuid) -> AppResult<Section> {
        let row = sqlx::query_as::<_, SectionRow>(
            "SELECT id, name, unit_kind, created_at, updated_at FROM sections WHERE id = $1",
        )
        .bind(section_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Section".to_string()))?;

        row.into_model()
    }

    /// List all sections
    pub async fn list_sections(&self) -> AppResult<Vec<Section>> {
        let rows = sqlx::query_as::<_, SectionRow>(
            "SELECT id, name, unit_kind, created_at, updated_at FROM sections ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(|r| r.into_model()).collect()
    }

    /// Get an item by ID
    pub async fn get_item(&self, item_id: Uuid) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT id, name, section_id, created_at, updated_at FROM items WHERE id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        Ok(row.into())
    }

    /// List all items
    pub async fn list_items(&self) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, name, section_id, created_at, updated_at FROM items ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Get a grade by ID
    pub async fn get_grade(&self, grade_id: Uuid) -> AppResult<Grade> {
        let row = sqlx::query_as::<_, GradeRow>(
            "SELECT id, name, created_at, updated_at FROM grades WHERE id = $1",
        )
        .bind(grade_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Grade".to_string()))?;

        Ok(row.into())
    }

    /// List all grades
    pub async fn list_grades(&self) -> AppResult<Vec<Grade>> {
        let rows = sqlx::query_as::<_, GradeRow>(
            "SELECT id, name, created_at, updated_at FROM grades ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Delete a party. Dependent bags, ledger entries and aggregate rows
    /// are removed by the cascade.
    pub async fn delete_party(&self, party_id: Uuid) -> AppResult<()> {
        self.delete_dimension("parties", "Party", party_id).await
    }

    /// Delete a weight bucket.
    pub async fn delete_weight(&self, weight_id: Uuid) -> AppResult<()> {
        self.delete_dimension("weights", "Weight", weight_id).await
    }

    /// Delete a section and its items.
    pub async fn delete_section(&self, section_id: Uuid) -> AppResult<()> {
        self.delete_dimension("sections", "Section", section_id)
            .await
    }

    /// Delete an item.
    pub async fn delete_item(&self, item_id: Uuid) -> AppResult<()> {
        self.delete_dimension("items", "Item", item_id).await
    }

    /// Delete a grade.
    pub async fn delete_grade(&self, grade_id: Uuid) -> AppResult<()> {
        self.delete_dimension("grades", "Grade", grade_id).await
    }

    async fn delete_dimension(&self, table: &str, resource: &str, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(resource.to_string()));
        }

        tracing::info!(%id, table, "dimension row deleted");
        Ok(())
    }
}
