//! Business logic services for the Warehouse Stock Ledger

pub mod dimension;
pub mod export_pool;
pub mod grading;
pub mod import;
pub mod stock;

pub use dimension::DimensionService;
pub use export_pool::ExportPoolService;
pub use grading::GradingService;
pub use import::ImportService;
pub use stock::StockService;

use crate::error::{AppError, AppResult};
use shared::types::UnitKind;

/// Parse a unit kind stored as text. The CHECK constraints make an unknown
/// value unreachable through normal writes, so one here is corruption.
pub(crate) fn unit_kind_from_db(s: &str) -> AppResult<UnitKind> {
    UnitKind::from_str(s)
        .ok_or_else(|| AppError::IntegrityViolation(format!("unknown unit kind {s:?}")))
}
