//! Validation utilities for the Warehouse Stock Ledger
//!
//! Pure input checks the backend services run before touching the database.

use rust_decimal::Decimal;

use crate::types::UnitKind;

/// Largest number of bags a single batch request may create.
pub const MAX_BATCH_SIZE: u32 = 500;

/// Validate a weight quantity is strictly positive.
pub fn validate_positive_weight(weight: Decimal) -> Result<(), &'static str> {
    if weight <= Decimal::ZERO {
        return Err("Weight must be positive");
    }
    Ok(())
}

/// Validate a batch quantity is within 1..=MAX_BATCH_SIZE.
pub fn validate_batch_quantity(quantity: u32) -> Result<(), &'static str> {
    if quantity == 0 {
        return Err("Batch quantity must be at least 1");
    }
    if quantity > MAX_BATCH_SIZE {
        return Err("Batch quantity exceeds the per-request limit");
    }
    Ok(())
}

/// Validate the pair count supplied with a grading entry against the
/// section's unit kind, returning the count to book.
///
/// Pair-kind sections require a positive pair count; kg-kind sections must
/// not carry one.
pub fn validate_grading_pair(
    section_kind: UnitKind,
    pair: Option<i64>,
) -> Result<i64, &'static str> {
    match section_kind {
        UnitKind::Pair => match pair {
            Some(p) if p > 0 => Ok(p),
            Some(_) => Err("Pair count must be positive"),
            None => Err("Pair count is required for pair-kind sections"),
        },
        UnitKind::Kg => match pair {
            None | Some(0) => Ok(0),
            Some(_) => Err("Pair count only applies to pair-kind sections"),
        },
    }
}

/// Validate an import code or barcode prefix: 3-64 uppercase alphanumeric
/// characters or dashes.
pub fn validate_reference_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 3 {
        return Err("Code must be at least 3 characters");
    }
    if code.len() > 64 {
        return Err("Code must be at most 64 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Code must be uppercase alphanumeric or dashes");
    }
    Ok(())
}

/// Validate a dimension name is non-empty after trimming.
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Name cannot be empty");
    }
    if name.len() > 120 {
        return Err("Name must be at most 120 characters");
    }
    Ok(())
}
