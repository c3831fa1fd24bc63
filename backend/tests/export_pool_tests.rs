//! Export pooling tests
//!
//! Export pooling converts graded (section, grade) stock into export-ready
//! bag counts, branching on the weight bucket's unit kind. These tests
//! replay batch requests through the shared delta arithmetic and check:
//! - Branch correctness for kg-kind and pair-kind buckets
//! - Batch atomicity: a rejected batch leaves every aggregate untouched
//! - Delete is the exact inverse of create
//! - Shortage reporting carries required and available amounts

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use shared::ledger::{
    export_bag_deltas, export_consumption, shortage, ExportConsumption, ExportLedgerDelta,
};
use shared::types::UnitKind;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// In-memory stand-ins for one (section, grade) graded stock row and one
/// (item, weight) export stock row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExportAggregates {
    graded_weight: Decimal,
    graded_pair: i64,
    export_count: i64,
}

impl ExportAggregates {
    fn new(weight: Decimal, pair: i64) -> Self {
        Self {
            graded_weight: weight,
            graded_pair: pair,
            export_count: 0,
        }
    }

    fn apply(&mut self, delta: ExportLedgerDelta) {
        self.graded_weight += delta.graded_weight;
        self.graded_pair += delta.graded_pair;
        self.export_count += delta.export_quantity;
    }

    /// Batch create with the service-layer contract: pre-check the whole
    /// batch's weight, then apply the per-bag rule N times or not at all.
    fn try_create_batch(
        &mut self,
        consumption: ExportConsumption,
        quantity: u32,
    ) -> Result<(), (Decimal, Decimal)> {
        let required = consumption.weight * Decimal::from(quantity);
        if required > self.graded_weight {
            return Err((required, self.graded_weight));
        }
        // Per-row floor re-check backs the pair count for pair buckets.
        let snapshot = self.clone();
        for _ in 0..quantity {
            self.apply(export_bag_deltas(consumption));
            if self.graded_pair < 0 {
                *self = snapshot.clone();
                return Err((required, snapshot.graded_weight));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Kg bucket: each bag consumes the bucket magnitude in weight
    #[test]
    fn test_kg_bucket_batch() {
        let mut agg = ExportAggregates::new(dec("100"), 0);
        let consumption = export_consumption(UnitKind::Kg, dec("25"), None).unwrap();

        agg.try_create_batch(consumption, 3).unwrap();

        assert_eq!(agg.graded_weight, dec("25"));
        assert_eq!(agg.export_count, 3);
    }

    /// Pair bucket scenario: grading booked 12.5 kg / 25 pairs; one bag
    /// with bucket magnitude 5 (pairs) and a 2.5 kg override
    #[test]
    fn test_pair_bucket_scenario() {
        let mut agg = ExportAggregates::new(dec("12.5"), 25);
        let consumption = export_consumption(UnitKind::Pair, dec("5"), Some(dec("2.5"))).unwrap();

        agg.try_create_batch(consumption, 1).unwrap();

        assert_eq!(agg.graded_weight, dec("10"));
        assert_eq!(agg.graded_pair, 20);
        assert_eq!(agg.export_count, 1);
    }

    /// A batch whose total weight exceeds availability is rejected whole
    #[test]
    fn test_oversized_batch_rejected_whole() {
        let initial = ExportAggregates::new(dec("100"), 0);
        let mut agg = initial.clone();
        let consumption = export_consumption(UnitKind::Kg, dec("25"), None).unwrap();

        // 5 bags need 125 kg against 100 kg on hand.
        let err = agg.try_create_batch(consumption, 5).unwrap_err();

        assert_eq!(err, (dec("125"), dec("100")));
        assert_eq!(agg, initial);
        assert_eq!(shortage(err.0, err.1), dec("25"));
    }

    /// A pair-count shortfall also rejects the batch whole
    #[test]
    fn test_pair_floor_rejects_batch_whole() {
        // Plenty of weight, but only 8 pairs on hand.
        let initial = ExportAggregates::new(dec("100"), 8);
        let mut agg = initial.clone();
        let consumption = export_consumption(UnitKind::Pair, dec("5"), Some(dec("1"))).unwrap();

        assert!(agg.try_create_batch(consumption, 2).is_err());
        assert_eq!(agg, initial);
    }

    /// Deleting a bag returns its consumption to graded stock
    #[test]
    fn test_delete_returns_consumption() {
        let initial = ExportAggregates::new(dec("12.5"), 25);
        let mut agg = initial.clone();
        let consumption = export_consumption(UnitKind::Pair, dec("5"), Some(dec("2.5"))).unwrap();

        agg.apply(export_bag_deltas(consumption));
        agg.apply(export_bag_deltas(consumption).inverse());

        assert_eq!(agg, initial);
    }

    /// An exactly-sized batch drains the stock to zero
    #[test]
    fn test_exact_batch_drains_stock() {
        let mut agg = ExportAggregates::new(dec("100"), 0);
        let consumption = export_consumption(UnitKind::Kg, dec("25"), None).unwrap();

        agg.try_create_batch(consumption, 4).unwrap();

        assert_eq!(agg.graded_weight, Decimal::ZERO);
        assert_eq!(agg.export_count, 4);

        // The next bag has nothing left to consume.
        assert!(agg.try_create_batch(consumption, 1).is_err());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn weight_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=1000i64).prop_map(|n| Decimal::new(n, 1)) // 0.1 to 100.0
    }

    fn consumption_strategy() -> impl Strategy<Value = ExportConsumption> {
        prop_oneof![
            weight_strategy()
                .prop_map(|m| export_consumption(UnitKind::Kg, m, None).unwrap()),
            (1i64..=50, weight_strategy()).prop_map(|(pairs, w)| {
                export_consumption(UnitKind::Pair, Decimal::from(pairs), Some(w)).unwrap()
            }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Atomicity: a batch either applies N full bag deltas or leaves
        /// the aggregates byte-identical.
        #[test]
        fn prop_batch_all_or_nothing(
            stock_weight in weight_strategy(),
            stock_pair in 0i64..=500,
            consumption in consumption_strategy(),
            quantity in 1u32..=20
        ) {
            let initial = ExportAggregates::new(stock_weight, stock_pair);
            let mut agg = initial.clone();

            match agg.try_create_batch(consumption, quantity) {
                Ok(()) => {
                    let n = Decimal::from(quantity);
                    prop_assert_eq!(agg.graded_weight, initial.graded_weight - consumption.weight * n);
                    prop_assert_eq!(agg.graded_pair, initial.graded_pair - consumption.pair * quantity as i64);
                    prop_assert_eq!(agg.export_count, quantity as i64);
                }
                Err((required, available)) => {
                    prop_assert_eq!(agg.clone(), initial.clone());
                    // Reported amounts describe the rejected request.
                    prop_assert_eq!(available, initial.graded_weight);
                    prop_assert!(
                        required > available || initial.graded_pair < consumption.pair * quantity as i64
                    );
                }
            }
        }

        /// Stock never goes negative whatever the request mix.
        #[test]
        fn prop_stock_never_negative(
            stock_weight in weight_strategy(),
            stock_pair in 0i64..=500,
            batches in prop::collection::vec((consumption_strategy(), 1u32..=10), 0..10)
        ) {
            let mut agg = ExportAggregates::new(stock_weight, stock_pair);
            for (consumption, quantity) in batches {
                let _ = agg.try_create_batch(consumption, quantity);
                prop_assert!(agg.graded_weight >= Decimal::ZERO);
                prop_assert!(agg.graded_pair >= 0);
            }
        }

        /// Inverse: creating then deleting a whole batch restores the
        /// aggregates exactly.
        #[test]
        fn prop_batch_create_delete_identity(
            stock_weight in weight_strategy(),
            stock_pair in 0i64..=500,
            consumption in consumption_strategy(),
            quantity in 1u32..=10
        ) {
            let initial = ExportAggregates::new(stock_weight, stock_pair);
            let mut agg = initial.clone();

            if agg.try_create_batch(consumption, quantity).is_ok() {
                for _ in 0..quantity {
                    agg.apply(export_bag_deltas(consumption).inverse());
                }
                prop_assert_eq!(agg, initial);
            }
        }

        /// Shortage is zero exactly when the requirement fits.
        #[test]
        fn prop_shortage_sign(
            required in weight_strategy(),
            available in weight_strategy()
        ) {
            let s = shortage(required, available);
            if required > available {
                prop_assert_eq!(s, required - available);
            } else {
                prop_assert_eq!(s, Decimal::ZERO);
            }
        }
    }
}
