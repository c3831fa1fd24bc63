//! Shared types and models for the Warehouse Stock Ledger
//!
//! This crate contains the dimension and ledger-entry models, the unit-kind
//! and bag-status enumerations, and the pure signed-delta arithmetic that
//! the backend services apply inside their transactions.

pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
