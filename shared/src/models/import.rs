//! Import shipment and bag models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::BagStatus;

/// An inbound shipment under which bags arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub id: Uuid,
    pub code: String,
    pub arrived_on: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One physical bag received under an import.
///
/// Bags are created `unopened`; opening one moves its weight into the
/// owning party's in-process pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBag {
    pub id: Uuid,
    pub import_id: Uuid,
    pub party_id: Uuid,
    pub weight_id: Uuid,
    pub status: BagStatus,
    pub barcode: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
