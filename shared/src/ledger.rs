//! Signed-delta arithmetic for the stock ledger
//!
//! Every ledger-affecting event maps to exactly one value here. The backend
//! applies these numbers as relative `SET x = x + delta` updates inside the
//! event's transaction; the test suite replays them against an in-memory
//! model. Delete events are the exact negation of their create events, so
//! each delta type carries an `inverse`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{BagStatus, UnitKind};

/// Rule violations detectable without touching storage.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LedgerRuleViolation {
    #[error("pair-kind weight bucket requires an explicit weight override")]
    MissingWeightOverride,

    #[error("weight override must be positive")]
    NonPositiveWeightOverride,

    #[error("weight override only applies to pair-kind weight buckets")]
    UnexpectedWeightOverride,

    #[error("pair-kind bucket magnitude must be a whole pair count")]
    FractionalPairCount,
}

/// Delta applied to the import and in-process buckets by a bag event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BagLedgerDelta {
    /// Change to `import_stocks.quantity` for the bag's (party, weight) key.
    pub import_quantity: i64,
    /// Change to `in_process_stocks.weight` for the bag's party.
    pub in_process_weight: Decimal,
}

impl BagLedgerDelta {
    pub fn inverse(self) -> Self {
        Self {
            import_quantity: -self.import_quantity,
            in_process_weight: -self.in_process_weight,
        }
    }
}

/// Contribution of a newly created bag. Bags start unopened.
pub fn bag_creation_delta() -> BagLedgerDelta {
    BagLedgerDelta {
        import_quantity: 1,
        in_process_weight: Decimal::ZERO,
    }
}

/// Delta for an explicit old→new status comparison.
///
/// Returns `None` when the update does not change the status: a no-op
/// toggle must leave the aggregates untouched. `magnitude` is the bag's
/// weight-bucket magnitude in kilograms.
pub fn bag_status_deltas(
    old: BagStatus,
    new: BagStatus,
    magnitude: Decimal,
) -> Option<BagLedgerDelta> {
    match (old, new) {
        (BagStatus::Unopened, BagStatus::Opened) => Some(BagLedgerDelta {
            import_quantity: -1,
            in_process_weight: magnitude,
        }),
        (BagStatus::Opened, BagStatus::Unopened) => Some(BagLedgerDelta {
            import_quantity: 1,
            in_process_weight: -magnitude,
        }),
        _ => None,
    }
}

/// Removing a bag reverses exactly the bucket it currently occupies, never
/// the other one.
pub fn bag_removal_deltas(status: BagStatus, magnitude: Decimal) -> BagLedgerDelta {
    match status {
        BagStatus::Unopened => BagLedgerDelta {
            import_quantity: -1,
            in_process_weight: Decimal::ZERO,
        },
        BagStatus::Opened => BagLedgerDelta {
            import_quantity: 0,
            in_process_weight: -magnitude,
        },
    }
}

/// Delta applied by one grading entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradingLedgerDelta {
    /// Change to the party's `in_process_stocks.weight`.
    pub in_process_weight: Decimal,
    /// Change to `graded_stocks.weight` for the (section, grade) key.
    pub graded_weight: Decimal,
    /// Change to `graded_stocks.pair`; zero for kg-kind sections.
    pub graded_pair: i64,
}

impl GradingLedgerDelta {
    pub fn inverse(self) -> Self {
        Self {
            in_process_weight: -self.in_process_weight,
            graded_weight: -self.graded_weight,
            graded_pair: -self.graded_pair,
        }
    }
}

/// Deltas for creating a grading entry: the graded weight leaves the
/// party's opened pool and lands on the (section, grade) stock. Pair-kind
/// sections additionally book the pair count.
pub fn grading_deltas(section_kind: UnitKind, weight: Decimal, pair: i64) -> GradingLedgerDelta {
    let graded_pair = match section_kind {
        UnitKind::Kg => 0,
        UnitKind::Pair => pair,
    };
    GradingLedgerDelta {
        in_process_weight: -weight,
        graded_weight: weight,
        graded_pair,
    }
}

/// Deltas for revising a grading entry: the difference between the new and
/// old contributions, branch logic included.
pub fn grading_revision_deltas(
    section_kind: UnitKind,
    old_weight: Decimal,
    old_pair: i64,
    new_weight: Decimal,
    new_pair: i64,
) -> GradingLedgerDelta {
    let new = grading_deltas(section_kind, new_weight, new_pair);
    let old = grading_deltas(section_kind, old_weight, old_pair);
    GradingLedgerDelta {
        in_process_weight: new.in_process_weight - old.in_process_weight,
        graded_weight: new.graded_weight - old.graded_weight,
        graded_pair: new.graded_pair - old.graded_pair,
    }
}

/// What one export bag consumes from graded stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportConsumption {
    pub weight: Decimal,
    pub pair: i64,
}

/// Resolve the per-bag consumption for a weight bucket.
///
/// Kg-kind buckets consume their magnitude in kilograms. Pair-kind buckets
/// consume the explicit weight override in kilograms and the bucket
/// magnitude as a pair count.
pub fn export_consumption(
    bucket_kind: UnitKind,
    magnitude: Decimal,
    weight_override: Option<Decimal>,
) -> Result<ExportConsumption, LedgerRuleViolation> {
    match bucket_kind {
        UnitKind::Kg => {
            if weight_override.is_some() {
                return Err(LedgerRuleViolation::UnexpectedWeightOverride);
            }
            Ok(ExportConsumption {
                weight: magnitude,
                pair: 0,
            })
        }
        UnitKind::Pair => {
            let weight = weight_override.ok_or(LedgerRuleViolation::MissingWeightOverride)?;
            if weight <= Decimal::ZERO {
                return Err(LedgerRuleViolation::NonPositiveWeightOverride);
            }
            if !magnitude.fract().is_zero() {
                return Err(LedgerRuleViolation::FractionalPairCount);
            }
            let pair = magnitude
                .to_i64()
                .ok_or(LedgerRuleViolation::FractionalPairCount)?;
            Ok(ExportConsumption { weight, pair })
        }
    }
}

/// Delta applied by one export bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportLedgerDelta {
    /// Change to `graded_stocks.weight` for the item's (section, grade).
    pub graded_weight: Decimal,
    /// Change to `graded_stocks.pair`.
    pub graded_pair: i64,
    /// Change to `export_stocks.quantity` for the (item, weight) key.
    pub export_quantity: i64,
}

impl ExportLedgerDelta {
    pub fn inverse(self) -> Self {
        Self {
            graded_weight: -self.graded_weight,
            graded_pair: -self.graded_pair,
            export_quantity: -self.export_quantity,
        }
    }
}

/// Deltas for creating one export bag out of graded stock.
pub fn export_bag_deltas(consumption: ExportConsumption) -> ExportLedgerDelta {
    ExportLedgerDelta {
        graded_weight: -consumption.weight,
        graded_pair: -consumption.pair,
        export_quantity: 1,
    }
}

/// How far a requirement exceeds availability; zero when it does not.
pub fn shortage(required: Decimal, available: Decimal) -> Decimal {
    if required > available {
        required - available
    } else {
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_bag_open_moves_count_to_weight() {
        let delta = bag_status_deltas(BagStatus::Unopened, BagStatus::Opened, dec("25")).unwrap();
        assert_eq!(delta.import_quantity, -1);
        assert_eq!(delta.in_process_weight, dec("25"));
    }

    #[test]
    fn test_bag_toggle_is_symmetric() {
        let open = bag_status_deltas(BagStatus::Unopened, BagStatus::Opened, dec("25")).unwrap();
        let close = bag_status_deltas(BagStatus::Opened, BagStatus::Unopened, dec("25")).unwrap();
        assert_eq!(close, open.inverse());
    }

    #[test]
    fn test_bag_noop_toggle_yields_no_delta() {
        assert!(bag_status_deltas(BagStatus::Opened, BagStatus::Opened, dec("25")).is_none());
        assert!(bag_status_deltas(BagStatus::Unopened, BagStatus::Unopened, dec("25")).is_none());
    }

    #[test]
    fn test_bag_removal_reverses_current_bucket_only() {
        let unopened = bag_removal_deltas(BagStatus::Unopened, dec("25"));
        assert_eq!(unopened.import_quantity, -1);
        assert_eq!(unopened.in_process_weight, Decimal::ZERO);

        let opened = bag_removal_deltas(BagStatus::Opened, dec("25"));
        assert_eq!(opened.import_quantity, 0);
        assert_eq!(opened.in_process_weight, dec("-25"));
    }

    #[test]
    fn test_grading_kg_section_ignores_pair() {
        let delta = grading_deltas(UnitKind::Kg, dec("60"), 7);
        assert_eq!(delta.in_process_weight, dec("-60"));
        assert_eq!(delta.graded_weight, dec("60"));
        assert_eq!(delta.graded_pair, 0);
    }

    #[test]
    fn test_grading_pair_section_books_pair_count() {
        let delta = grading_deltas(UnitKind::Pair, dec("12.5"), 25);
        assert_eq!(delta.in_process_weight, dec("-12.5"));
        assert_eq!(delta.graded_weight, dec("12.5"));
        assert_eq!(delta.graded_pair, 25);
    }

    #[test]
    fn test_grading_delete_is_exact_inverse() {
        let create = grading_deltas(UnitKind::Pair, dec("12.5"), 25);
        let delete = create.inverse();
        assert_eq!(create.in_process_weight + delete.in_process_weight, Decimal::ZERO);
        assert_eq!(create.graded_weight + delete.graded_weight, Decimal::ZERO);
        assert_eq!(create.graded_pair + delete.graded_pair, 0);
    }

    #[test]
    fn test_grading_revision_applies_difference() {
        let delta = grading_revision_deltas(UnitKind::Pair, dec("10"), 20, dec("12.5"), 25);
        assert_eq!(delta.in_process_weight, dec("-2.5"));
        assert_eq!(delta.graded_weight, dec("2.5"));
        assert_eq!(delta.graded_pair, 5);
    }

    #[test]
    fn test_grading_revision_no_change_is_zero() {
        let delta = grading_revision_deltas(UnitKind::Kg, dec("10"), 0, dec("10"), 0);
        assert_eq!(delta.in_process_weight, Decimal::ZERO);
        assert_eq!(delta.graded_weight, Decimal::ZERO);
        assert_eq!(delta.graded_pair, 0);
    }

    #[test]
    fn test_export_kg_bucket_consumes_magnitude() {
        let c = export_consumption(UnitKind::Kg, dec("25"), None).unwrap();
        assert_eq!(c.weight, dec("25"));
        assert_eq!(c.pair, 0);
    }

    #[test]
    fn test_export_kg_bucket_rejects_override() {
        let err = export_consumption(UnitKind::Kg, dec("25"), Some(dec("2.5"))).unwrap_err();
        assert_eq!(err, LedgerRuleViolation::UnexpectedWeightOverride);
    }

    #[test]
    fn test_export_pair_bucket_uses_override_and_pair_count() {
        // Bucket magnitude 5 counts pairs; the bag itself weighs 2.5 kg.
        let c = export_consumption(UnitKind::Pair, dec("5"), Some(dec("2.5"))).unwrap();
        assert_eq!(c.weight, dec("2.5"));
        assert_eq!(c.pair, 5);
    }

    #[test]
    fn test_export_pair_bucket_requires_override() {
        let err = export_consumption(UnitKind::Pair, dec("5"), None).unwrap_err();
        assert_eq!(err, LedgerRuleViolation::MissingWeightOverride);
    }

    #[test]
    fn test_export_pair_bucket_rejects_fractional_magnitude() {
        let err = export_consumption(UnitKind::Pair, dec("5.5"), Some(dec("2.5"))).unwrap_err();
        assert_eq!(err, LedgerRuleViolation::FractionalPairCount);
    }

    #[test]
    fn test_export_bag_delta_and_inverse() {
        let c = export_consumption(UnitKind::Pair, dec("5"), Some(dec("2.5"))).unwrap();
        let create = export_bag_deltas(c);
        assert_eq!(create.graded_weight, dec("-2.5"));
        assert_eq!(create.graded_pair, -5);
        assert_eq!(create.export_quantity, 1);

        let delete = create.inverse();
        assert_eq!(delete.graded_weight, dec("2.5"));
        assert_eq!(delete.graded_pair, 5);
        assert_eq!(delete.export_quantity, -1);
    }

    #[test]
    fn test_shortage() {
        assert_eq!(shortage(dec("100"), dec("60")), dec("40"));
        assert_eq!(shortage(dec("60"), dec("100")), Decimal::ZERO);
        assert_eq!(shortage(dec("60"), dec("60")), Decimal::ZERO);
    }
}
