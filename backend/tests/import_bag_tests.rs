//! Import bag ledger tests
//!
//! The bag ledger moves stock between the unopened count and the opened
//! in-process pool. These tests replay bag event sequences through the
//! shared delta arithmetic and check:
//! - Conservation: toggles move stock between buckets, never create it
//! - Idempotence: a no-op status update leaves aggregates unchanged
//! - Inverse: create followed by delete returns to the prior state

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use shared::ledger::{bag_creation_delta, bag_removal_deltas, bag_status_deltas, BagLedgerDelta};
use shared::types::BagStatus;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// In-memory stand-ins for the (party, weight) import stock row and the
/// party's in-process row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct BagAggregates {
    unopened: i64,
    in_process: Decimal,
}

impl BagAggregates {
    fn apply(&mut self, delta: BagLedgerDelta) {
        self.unopened += delta.import_quantity;
        self.in_process += delta.in_process_weight;
    }
}

/// A bag as the source table sees it; `None` means deleted.
type Bag = Option<(BagStatus, Decimal)>;

/// Recompute the aggregates from the surviving source rows, the way a full
/// rebuild would.
fn recompute(bags: &[Bag]) -> BagAggregates {
    let mut agg = BagAggregates::default();
    for bag in bags.iter().flatten() {
        match bag.0 {
            BagStatus::Unopened => agg.unopened += 1,
            BagStatus::Opened => agg.in_process += bag.1,
        }
    }
    agg
}

#[derive(Debug, Clone)]
enum BagOp {
    Create(Decimal),
    SetStatus(usize, BagStatus),
    Delete(usize),
}

/// Replay operations, maintaining the aggregates incrementally alongside
/// the source rows.
fn replay(ops: &[BagOp]) -> (Vec<Bag>, BagAggregates) {
    let mut bags: Vec<Bag> = Vec::new();
    let mut agg = BagAggregates::default();

    for op in ops {
        match op {
            BagOp::Create(magnitude) => {
                bags.push(Some((BagStatus::Unopened, *magnitude)));
                agg.apply(bag_creation_delta());
            }
            BagOp::SetStatus(idx, new_status) => {
                if bags.is_empty() {
                    continue;
                }
                let idx = idx % bags.len();
                if let Some((status, magnitude)) = bags[idx] {
                    if let Some(delta) = bag_status_deltas(status, *new_status, magnitude) {
                        agg.apply(delta);
                        bags[idx] = Some((*new_status, magnitude));
                    }
                }
            }
            BagOp::Delete(idx) => {
                if bags.is_empty() {
                    continue;
                }
                let idx = idx % bags.len();
                if let Some((status, magnitude)) = bags[idx].take() {
                    agg.apply(bag_removal_deltas(status, magnitude));
                }
            }
        }
    }

    (bags, agg)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Ten 25 kg bags created: unopened count 10, nothing in process
    #[test]
    fn test_batch_creation_counts_unopened() {
        let ops: Vec<BagOp> = (0..10).map(|_| BagOp::Create(dec("25"))).collect();
        let (_, agg) = replay(&ops);

        assert_eq!(agg.unopened, 10);
        assert_eq!(agg.in_process, Decimal::ZERO);
    }

    /// Opening 4 of 10 bags of 25 kg: count 6, pool 100 kg
    #[test]
    fn test_opening_moves_weight_into_process() {
        let mut ops: Vec<BagOp> = (0..10).map(|_| BagOp::Create(dec("25"))).collect();
        for i in 0..4 {
            ops.push(BagOp::SetStatus(i, BagStatus::Opened));
        }
        let (_, agg) = replay(&ops);

        assert_eq!(agg.unopened, 6);
        assert_eq!(agg.in_process, dec("100"));
    }

    /// Re-closing an opened bag restores the original buckets
    #[test]
    fn test_toggle_round_trip_restores_buckets() {
        let ops = vec![
            BagOp::Create(dec("25")),
            BagOp::SetStatus(0, BagStatus::Opened),
            BagOp::SetStatus(0, BagStatus::Unopened),
        ];
        let (_, agg) = replay(&ops);

        assert_eq!(agg.unopened, 1);
        assert_eq!(agg.in_process, Decimal::ZERO);
    }

    /// Setting the current status again changes nothing
    #[test]
    fn test_noop_toggle_leaves_aggregates_unchanged() {
        let base = vec![
            BagOp::Create(dec("25")),
            BagOp::SetStatus(0, BagStatus::Opened),
        ];
        let (_, before) = replay(&base);

        let mut with_noop = base.clone();
        with_noop.push(BagOp::SetStatus(0, BagStatus::Opened));
        let (_, after) = replay(&with_noop);

        assert_eq!(before, after);
    }

    /// Deleting an unopened bag decrements the count only
    #[test]
    fn test_delete_unopened_bag() {
        let ops = vec![BagOp::Create(dec("25")), BagOp::Delete(0)];
        let (_, agg) = replay(&ops);

        assert_eq!(agg, BagAggregates::default());
    }

    /// Deleting an opened bag drains the pool only
    #[test]
    fn test_delete_opened_bag() {
        let ops = vec![
            BagOp::Create(dec("25")),
            BagOp::SetStatus(0, BagStatus::Opened),
            BagOp::Delete(0),
        ];
        let (_, agg) = replay(&ops);

        assert_eq!(agg, BagAggregates::default());
    }

    /// Mixed magnitudes accumulate independently
    #[test]
    fn test_mixed_magnitudes() {
        let ops = vec![
            BagOp::Create(dec("25")),
            BagOp::Create(dec("50")),
            BagOp::SetStatus(0, BagStatus::Opened),
            BagOp::SetStatus(1, BagStatus::Opened),
        ];
        let (_, agg) = replay(&ops);

        assert_eq!(agg.unopened, 0);
        assert_eq!(agg.in_process, dec("75"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn magnitude_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=500i64).prop_map(|n| Decimal::new(n, 1)) // 0.1 to 50.0
    }

    fn status_strategy() -> impl Strategy<Value = BagStatus> {
        prop_oneof![Just(BagStatus::Unopened), Just(BagStatus::Opened)]
    }

    fn op_strategy() -> impl Strategy<Value = BagOp> {
        prop_oneof![
            magnitude_strategy().prop_map(BagOp::Create),
            (any::<usize>(), status_strategy()).prop_map(|(i, s)| BagOp::SetStatus(i, s)),
            any::<usize>().prop_map(BagOp::Delete),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Conservation: for any event sequence, the incrementally
        /// maintained aggregates equal a full rebuild from the source rows.
        #[test]
        fn prop_incremental_matches_rebuild(
            ops in prop::collection::vec(op_strategy(), 0..40)
        ) {
            let (bags, agg) = replay(&ops);
            prop_assert_eq!(agg, recompute(&bags));
        }

        /// A toggle never changes the total stock a bag set represents:
        /// unopened bags plus opened weight bags always account for every
        /// surviving bag exactly once.
        #[test]
        fn prop_every_bag_counted_once(
            ops in prop::collection::vec(op_strategy(), 0..40)
        ) {
            let (bags, agg) = replay(&ops);
            let surviving = bags.iter().flatten().count() as i64;
            let opened = bags
                .iter()
                .flatten()
                .filter(|(s, _)| *s == BagStatus::Opened)
                .count() as i64;

            prop_assert_eq!(agg.unopened, surviving - opened);
        }

        /// Idempotence: appending a no-op toggle to any sequence leaves the
        /// aggregates untouched.
        #[test]
        fn prop_noop_toggle_is_identity(
            ops in prop::collection::vec(op_strategy(), 1..30),
            idx in any::<usize>()
        ) {
            let (bags, before) = replay(&ops);
            if bags.is_empty() {
                return Ok(());
            }
            let target = idx % bags.len();
            let Some((status, _)) = bags[target] else {
                return Ok(());
            };

            let mut with_noop = ops.clone();
            with_noop.push(BagOp::SetStatus(target, status));
            let (_, after) = replay(&with_noop);

            prop_assert_eq!(before, after);
        }

        /// Inverse: any create immediately followed by its delete returns
        /// the aggregates to their prior values exactly.
        #[test]
        fn prop_create_then_delete_is_identity(
            ops in prop::collection::vec(op_strategy(), 0..30),
            magnitude in magnitude_strategy()
        ) {
            let (bags, before) = replay(&ops);

            let mut extended = ops.clone();
            extended.push(BagOp::Create(magnitude));
            extended.push(BagOp::Delete(bags.len()));
            let (_, after) = replay(&extended);

            prop_assert_eq!(before, after);
        }

        /// Aggregates never go negative under valid event sequences.
        #[test]
        fn prop_aggregates_stay_non_negative(
            ops in prop::collection::vec(op_strategy(), 0..40)
        ) {
            let (_, agg) = replay(&ops);
            prop_assert!(agg.unopened >= 0);
            prop_assert!(agg.in_process >= Decimal::ZERO);
        }
    }
}
