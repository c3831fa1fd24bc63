//! Database models for the Warehouse Stock Ledger
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
