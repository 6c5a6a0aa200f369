//! Property tests for allocation invariants.
//!
//! Uses proptest to verify:
//! 1. Scarcity: qty never exceeds demand or availability, never negative
//! 2. Floor: under Clamp every row's pre-inflation demand reaches min_qty
//! 3. Presence: every row has a minimum-shipment record and positive supply
//! 4. Ordering: output is sorted by (product_id, branch_id) and within limit
//! 5. Volume: in volume mode every row fits its branch's free volume

use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use hubflow_core::data::InMemoryFacts;
use hubflow_core::domain::{
    BranchId, BranchInventoryFact, BranchStorageLimit, DemandRequirement, HubInventoryFact,
    MinimumShipment, ProductId, ProductVolume,
};
use hubflow_core::engine::{free_volume_by_branch, lead_time_factor};
use hubflow_core::{allocate, AllocationRequest, FactSnapshot, MinimumShipmentPolicy};

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_quantity() -> impl Strategy<Value = f64> {
    (0.0..500.0_f64).prop_map(|q| (q * 100.0).round() / 100.0)
}

/// One (branch, product) pair's worth of facts.
#[derive(Debug, Clone)]
struct PairFacts {
    branch: u8,
    product: u8,
    needs: f64,
    stock: f64,
    in_transit: f64,
    min_qty: Option<f64>,
}

fn arb_pair() -> impl Strategy<Value = PairFacts> {
    (
        0u8..6,
        0u8..6,
        arb_quantity(),
        arb_quantity(),
        arb_quantity(),
        prop::option::weighted(0.8, 1.0..20.0_f64),
    )
        .prop_map(|(branch, product, needs, stock, in_transit, min_qty)| PairFacts {
            branch,
            product,
            needs,
            stock,
            in_transit,
            min_qty,
        })
}

fn arb_facts() -> impl Strategy<Value = InMemoryFacts> {
    (
        prop::collection::vec(arb_pair(), 0..30),
        prop::collection::vec((0u8..6, -50.0..300.0_f64), 0..10),
        prop::collection::vec((0u8..6, 100.0..5000.0_f64), 0..6),
        prop::collection::vec((0u8..6, 0.0..5.0_f64), 0..6),
    )
        .prop_map(|(pairs, hubs, limits, volumes)| {
            let mut facts = InMemoryFacts::default();
            for pair in pairs {
                let b = BranchId::from_u128(pair.branch as u128);
                let p = ProductId::from_u128(pair.product as u128);
                facts.branch.push(BranchInventoryFact {
                    branch_id: b,
                    product_id: p,
                    date: run_date(),
                    stock: pair.stock,
                    reserved: 0.0,
                    in_transit: pair.in_transit,
                });
                facts.needs.push(DemandRequirement {
                    branch_id: b,
                    product_id: p,
                    needs: pair.needs,
                });
                if let Some(min_qty) = pair.min_qty {
                    facts.minimums.push(MinimumShipment {
                        branch_id: b,
                        product_id: p,
                        min_qty,
                    });
                }
            }
            for (p, available) in hubs {
                facts.hub.push(HubInventoryFact {
                    product_id: ProductId::from_u128(p as u128),
                    date: run_date(),
                    stock: available,
                    reserved: 0.0,
                    in_transit: 0.0,
                });
            }
            for (b, max_volume) in limits {
                facts.storage_limits.push(BranchStorageLimit {
                    branch_id: BranchId::from_u128(b as u128),
                    max_volume,
                });
            }
            for (p, volume_per_unit) in volumes {
                facts.volumes.push(ProductVolume {
                    product_id: ProductId::from_u128(p as u128),
                    volume_per_unit,
                });
            }
            facts
        })
}

fn arb_policy() -> impl Strategy<Value = MinimumShipmentPolicy> {
    prop_oneof![
        Just(MinimumShipmentPolicy::Clamp),
        Just(MinimumShipmentPolicy::Filter),
    ]
}

proptest! {
    /// qty ≤ demand, qty ≤ available, qty ≥ 0, available > 0.
    #[test]
    fn scarcity_bounds_hold(facts in arb_facts(), policy in arb_policy(), volume in any::<bool>()) {
        let req = AllocationRequest::new(run_date())
            .with_policy(policy)
            .with_volume(volume);
        let rows = allocate(&facts, &req).unwrap();
        for row in &rows {
            prop_assert!(row.qty >= 0.0);
            prop_assert!(row.qty <= row.demand + 1e-9);
            prop_assert!(row.qty <= row.available + 1e-9);
            prop_assert!(row.available > 0.0);
        }
    }

    /// Under Clamp, demand / lead-time factor never falls below min_qty.
    #[test]
    fn clamp_floor_holds(facts in arb_facts()) {
        let req = AllocationRequest::new(run_date());
        let snapshot = FactSnapshot::load(&facts, &req).unwrap();
        let rows = allocate(&facts, &req).unwrap();
        for row in &rows {
            let min_qty = snapshot.minimum_shipment(row.branch_id, row.product_id).unwrap();
            let factor = lead_time_factor(snapshot.logdays(row.branch_id, row.product_id));
            prop_assert!(row.demand / factor + 1e-9 >= min_qty);
        }
    }

    /// Every row has a minimum-shipment record and a hub row for its product.
    #[test]
    fn rows_need_minimum_and_supply(facts in arb_facts(), policy in arb_policy()) {
        let minimums: BTreeSet<_> = facts
            .minimums
            .iter()
            .map(|m| (m.branch_id, m.product_id))
            .collect();
        let supplied: BTreeSet<_> = facts.hub.iter().map(|h| h.product_id).collect();
        let rows = allocate(&facts, &AllocationRequest::new(run_date()).with_policy(policy)).unwrap();
        for row in &rows {
            prop_assert!(minimums.contains(&(row.branch_id, row.product_id)));
            prop_assert!(supplied.contains(&row.product_id));
        }
    }

    /// Sorted by (product, branch), unique keys, and the limit is respected.
    #[test]
    fn output_sorted_and_limited(facts in arb_facts(), limit in 0usize..8) {
        let full = allocate(&facts, &AllocationRequest::new(run_date())).unwrap();
        let rows = allocate(&facts, &AllocationRequest::new(run_date()).with_limit(limit)).unwrap();

        for pair in rows.windows(2) {
            prop_assert!((pair[0].product_id, pair[0].branch_id) < (pair[1].product_id, pair[1].branch_id));
        }
        if limit == 0 {
            prop_assert_eq!(rows.len(), full.len());
        } else {
            prop_assert_eq!(rows.len(), full.len().min(limit));
            prop_assert_eq!(&rows[..], &full[..rows.len()]);
        }
    }

    /// In volume mode every surviving row fits its branch on its own.
    #[test]
    fn volume_rows_fit(facts in arb_facts()) {
        let req = AllocationRequest::new(run_date()).with_volume(true);
        let snapshot = FactSnapshot::load(&facts, &req).unwrap();
        let free: BTreeMap<BranchId, f64> = free_volume_by_branch(&snapshot);
        for row in allocate(&facts, &req).unwrap() {
            let branch_free = free[&row.branch_id];
            prop_assert!(branch_free > 0.0);
            prop_assert!(row.qty * snapshot.volume_per_unit(row.product_id) <= branch_free);
        }
    }
}
