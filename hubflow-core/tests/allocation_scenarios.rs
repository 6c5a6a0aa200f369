//! End-to-end allocation scenarios over in-memory facts and the Parquet store.

use chrono::NaiveDate;
use hubflow_core::data::{InMemoryFacts, ParquetStore};
use hubflow_core::domain::{
    BranchId, BranchInventoryFact, BranchStorageLimit, CategoryId, DemandRequirement,
    HubInventoryFact, LeadTimeProfile, MinimumShipment, ProductCategory, ProductId,
    ProductVolume,
};
use hubflow_core::fingerprint::RunFingerprint;
use hubflow_core::query::{AllocationFilter, Identifier, SourceTables, TableKind};
use hubflow_core::{allocate, AllocationRequest, MinimumShipmentPolicy};

// ── Fixture builders ─────────────────────────────────────────────────

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn branch(n: u128) -> BranchId {
    BranchId::from_u128(n)
}

fn product(n: u128) -> ProductId {
    ProductId::from_u128(n)
}

const CATEGORY: u128 = 0xc0;

fn hub(p: u128, available: f64) -> HubInventoryFact {
    HubInventoryFact {
        product_id: product(p),
        date: run_date(),
        stock: available + 5.0,
        reserved: 3.0,
        in_transit: 2.0,
    }
}

fn branch_stock(b: u128, p: u128, stock: f64) -> BranchInventoryFact {
    BranchInventoryFact {
        branch_id: branch(b),
        product_id: product(p),
        date: run_date(),
        stock,
        reserved: 0.0,
        in_transit: 0.0,
    }
}

fn need(b: u128, p: u128, needs: f64) -> DemandRequirement {
    DemandRequirement {
        branch_id: branch(b),
        product_id: product(p),
        needs,
    }
}

fn minimum(b: u128, p: u128, min_qty: f64) -> MinimumShipment {
    MinimumShipment {
        branch_id: branch(b),
        product_id: product(p),
        min_qty,
    }
}

fn categorised(p: u128) -> ProductCategory {
    ProductCategory {
        product_id: product(p),
        category_id: CategoryId::from_u128(CATEGORY),
    }
}

fn lead_time(b: u128, logdays: u32) -> LeadTimeProfile {
    LeadTimeProfile {
        branch_id: branch(b),
        category_id: CategoryId::from_u128(CATEGORY),
        logdays,
    }
}

/// Scenario A facts: hub available 100, branch needs 50 with 10 on hand,
/// min_qty 5, 14-day lead time.
fn scenario_a(available: f64) -> InMemoryFacts {
    InMemoryFacts {
        hub: vec![hub(1, available)],
        branch: vec![branch_stock(1, 1, 10.0)],
        needs: vec![need(1, 1, 50.0)],
        minimums: vec![minimum(1, 1, 5.0)],
        categories: vec![categorised(1)],
        lead_times: vec![lead_time(1, 14)],
        ..Default::default()
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn scenario_a_shortfall_inflated_by_lead_time() {
    let rows = allocate(&scenario_a(100.0), &AllocationRequest::new(run_date())).unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert!((row.demand - 40.0 * 44.0 / 30.0).abs() < 1e-9);
    assert!((row.qty - 58.67).abs() < 0.01);
    assert_eq!(row.available, 100.0);
}

#[test]
fn scenario_b_scarce_supply_caps_qty() {
    let rows = allocate(&scenario_a(30.0), &AllocationRequest::new(run_date())).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].qty, 30.0);
    assert!(rows[0].demand > 58.0);
}

#[test]
fn scenario_c_missing_minimum_excludes_pair() {
    let mut facts = scenario_a(100.0);
    facts.minimums.clear();
    let rows = allocate(&facts, &AllocationRequest::new(run_date())).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn scenario_d_full_branch_is_dropped_in_volume_mode() {
    let mut facts = scenario_a(100.0);
    // Branch 1 holds 10 units at 10.0 each against a 100.0 capacity: no room left
    facts.storage_limits = vec![
        BranchStorageLimit {
            branch_id: branch(1),
            max_volume: 100.0,
        },
        BranchStorageLimit {
            branch_id: branch(2),
            max_volume: 1000.0,
        },
    ];
    facts.volumes = vec![ProductVolume {
        product_id: product(1),
        volume_per_unit: 10.0,
    }];
    facts.needs.push(need(2, 1, 10.0));
    facts.minimums.push(minimum(2, 1, 1.0));

    let plain = allocate(&facts, &AllocationRequest::new(run_date())).unwrap();
    assert_eq!(plain.len(), 2);

    let volume = allocate(&facts, &AllocationRequest::new(run_date()).with_volume(true)).unwrap();
    assert_eq!(volume.len(), 1);
    assert_eq!(volume[0].branch_id, branch(2));
}

#[test]
fn scenario_e_limit_keeps_first_rows_in_order() {
    let facts = InMemoryFacts {
        hub: vec![hub(1, 100.0), hub(2, 100.0)],
        needs: vec![need(2, 2, 10.0), need(1, 2, 10.0), need(3, 1, 10.0)],
        minimums: vec![minimum(2, 2, 1.0), minimum(1, 2, 1.0), minimum(3, 1, 1.0)],
        ..Default::default()
    };

    let all = allocate(&facts, &AllocationRequest::new(run_date())).unwrap();
    assert_eq!(all.len(), 3);

    let rows = allocate(&facts, &AllocationRequest::new(run_date()).with_limit(2)).unwrap();
    let keys: Vec<_> = rows.iter().map(|r| (r.product_id, r.branch_id)).collect();
    assert_eq!(keys, vec![(product(1), branch(3)), (product(2), branch(1))]);
}

// ── Cross-cutting properties ─────────────────────────────────────────

#[test]
fn missing_lead_time_equals_explicit_seven_days() {
    let mut implicit = scenario_a(1000.0);
    implicit.lead_times.clear();
    let mut explicit = scenario_a(1000.0);
    explicit.lead_times = vec![lead_time(1, 7)];

    let req = AllocationRequest::new(run_date());
    assert_eq!(
        allocate(&implicit, &req).unwrap(),
        allocate(&explicit, &req).unwrap()
    );
}

#[test]
fn clamp_floor_ships_minimum_to_overstocked_branch() {
    let mut facts = scenario_a(100.0);
    facts.branch = vec![branch_stock(1, 1, 500.0)];
    let rows = allocate(&facts, &AllocationRequest::new(run_date())).unwrap();
    assert_eq!(rows.len(), 1);
    assert!((rows[0].demand - 5.0 * 44.0 / 30.0).abs() < 1e-9);

    let filtered = allocate(
        &facts,
        &AllocationRequest::new(run_date()).with_policy(MinimumShipmentPolicy::Filter),
    )
    .unwrap();
    assert!(filtered.is_empty());
}

#[test]
fn repeated_runs_are_identical() {
    let facts = scenario_a(100.0);
    let req = AllocationRequest::new(run_date()).with_limit(10);
    let a = allocate(&facts, &req).unwrap();
    let b = allocate(&facts, &req).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        RunFingerprint::compute(&req, &a).unwrap(),
        RunFingerprint::compute(&req, &b).unwrap()
    );
}

#[test]
fn filters_are_conjunctive_and_order_independent() {
    let mut facts = scenario_a(100.0);
    facts.hub.push(hub(2, 100.0));
    facts.needs.push(need(1, 2, 200.0));
    facts.minimums.push(minimum(1, 2, 1.0));

    let by_product = AllocationFilter::Product(product(2));
    let by_demand = AllocationFilter::MinDemand(50.0);
    let ab = AllocationRequest::new(run_date())
        .with_filter(by_product.clone())
        .with_filter(by_demand.clone());
    let ba = AllocationRequest::new(run_date())
        .with_filter(by_demand)
        .with_filter(by_product);

    let rows_ab = allocate(&facts, &ab).unwrap();
    assert_eq!(rows_ab, allocate(&facts, &ba).unwrap());
    assert_eq!(rows_ab.len(), 1);
    assert_eq!(rows_ab[0].product_id, product(2));
}

#[test]
fn category_filter_skips_uncategorised_products() {
    let mut facts = scenario_a(100.0);
    facts.hub.push(hub(2, 100.0));
    facts.needs.push(need(1, 2, 20.0));
    facts.minimums.push(minimum(1, 2, 1.0));

    let req = AllocationRequest::new(run_date())
        .with_filter(AllocationFilter::Category(CategoryId::from_u128(CATEGORY)));
    let rows = allocate(&facts, &req).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].product_id, product(1));
}

#[test]
fn non_positive_hub_supply_excludes_product() {
    let rows = allocate(&scenario_a(0.0), &AllocationRequest::new(run_date())).unwrap();
    assert!(rows.is_empty());
    let rows = allocate(&scenario_a(-4.0), &AllocationRequest::new(run_date())).unwrap();
    assert!(rows.is_empty());
}

// ── Parquet-backed run ───────────────────────────────────────────────

#[test]
fn parquet_store_matches_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let store = ParquetStore::new(dir.path());
    let tables = SourceTables::default();
    store.create_schema(&tables.schema).unwrap();

    let facts = scenario_a(100.0);
    store.write(&tables.table(TableKind::HubHistory), &facts.hub).unwrap();
    store.write(&tables.table(TableKind::BranchHistory), &facts.branch).unwrap();
    store.write(&tables.table(TableKind::Needs), &facts.needs).unwrap();
    store.write(&tables.table(TableKind::MinShipment), &facts.minimums).unwrap();
    store.write(&tables.table(TableKind::Product), &facts.categories).unwrap();
    store.write(&tables.table(TableKind::LeadTime), &facts.lead_times).unwrap();

    let req = AllocationRequest::new(run_date());
    assert_eq!(allocate(&store, &req).unwrap(), allocate(&facts, &req).unwrap());
}

#[test]
fn overridden_table_name_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let store = ParquetStore::new(dir.path());
    let tables = SourceTables::default();
    store.create_schema(&tables.schema).unwrap();
    for kind in TableKind::ALL {
        store.create_table(&tables.table(kind), kind).unwrap();
    }

    let ok = AllocationRequest::new(run_date());
    assert!(allocate(&store, &ok).unwrap().is_empty());

    let renamed = SourceTables::default()
        .with_table(TableKind::Needs, "needs_archive")
        .unwrap();
    let err = allocate(&store, &AllocationRequest::new(run_date()).with_tables(renamed))
        .unwrap_err();
    assert!(err.to_string().contains("logistics.needs_archive"));

    let other_schema = SourceTables {
        schema: Identifier::parse("staging").unwrap(),
        ..SourceTables::default()
    };
    assert!(allocate(&store, &AllocationRequest::new(run_date()).with_tables(other_schema)).is_err());
}
