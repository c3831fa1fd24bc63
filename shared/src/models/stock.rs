//! Aggregate stock models
//!
//! All four are derived state, maintained incrementally by the backend
//! ledger module. No other code writes them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unopened bag count per (party, weight bucket).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStock {
    pub party_id: Uuid,
    pub weight_id: Uuid,
    pub quantity: i64,
}

/// Opened-but-ungraded weight per party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InProcessStock {
    pub party_id: Uuid,
    pub weight: Decimal,
}

/// Weight graded but not yet bagged, per (section, grade). `pair` tracks
/// the auxiliary count for pair-kind sections and stays zero otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedStock {
    pub section_id: Uuid,
    pub grade_id: Uuid,
    pub weight: Decimal,
    pub pair: i64,
}

/// Export-ready bag count per (item, weight bucket).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStock {
    pub item_id: Uuid,
    pub weight_id: Uuid,
    pub quantity: i64,
}

/// Result of an export availability check: how much graded weight the
/// request needs, how much is on hand, and the gap if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityCheck {
    pub required: Decimal,
    pub available: Decimal,
    pub shortage: Decimal,
}
