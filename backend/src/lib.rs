//! Warehouse Stock Ledger - backend engine
//!
//! Keeps four derived stock tables (import, in-process, graded, export)
//! synchronized with mutations to the source entities: dimension inserts,
//! bag status changes, grading entries and export pooling. Every
//! ledger-affecting event runs as one database transaction that mutates the
//! source row and applies signed deltas to exactly the affected aggregate
//! rows, so the aggregates are never stale or double-counted.
//!
//! There is no wire protocol here: the embedding application constructs the
//! services over a [`sqlx::PgPool`] and calls them in-process.

pub mod config;
pub mod db;
pub mod error;
pub(crate) mod ledger;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
