//! Grading and export pool models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One grading event: opened in-process weight converted into
/// (section, grade) stock. `pair` is zero for kg-kind sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedItem {
    pub id: Uuid,
    pub party_id: Uuid,
    pub import_id: Uuid,
    pub section_id: Uuid,
    pub grade_id: Uuid,
    pub weight: Decimal,
    pub pair: i64,
    pub graded_at: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One bagged, export-ready unit.
///
/// `weight_override` is the actual bag weight for pair-kind weight buckets,
/// where the bucket magnitude counts pairs instead of kilograms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedBag {
    pub id: Uuid,
    pub import_id: Uuid,
    pub party_id: Uuid,
    pub item_id: Uuid,
    pub grade_id: Uuid,
    pub weight_id: Uuid,
    pub barcode: String,
    pub weight_override: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
