//! Stage 3: join demand with hub supply.
//!
//! `qty = min(adjusted_demand, available)` for every pair whose product has
//! positive supply. In volume mode a row survives only if it fits in the
//! branch's free volume on its own; rows that do not fit are dropped, never
//! shrunk.
//!
//! Free volume is computed once per branch and every row of that branch is
//! checked against the same number. Two products that each fit can together
//! exceed the branch's capacity.

use std::collections::BTreeMap;

use super::demand::BranchDemand;
use crate::domain::{AllocationRow, BranchId, ProductId};
use crate::snapshot::FactSnapshot;

/// `max_volume − Σ(stock × volume_per_unit)` for every branch with a storage
/// limit. Unknown volumes count as zero.
pub fn free_volume_by_branch(snapshot: &FactSnapshot) -> BTreeMap<BranchId, f64> {
    let mut used: BTreeMap<BranchId, f64> = BTreeMap::new();
    for (branch, product, pos) in snapshot.branch_positions() {
        *used.entry(branch).or_insert(0.0) += pos.stock * snapshot.volume_per_unit(product);
    }

    snapshot
        .storage_limits()
        .map(|(branch, max_volume)| {
            (branch, max_volume - used.get(&branch).copied().unwrap_or(0.0))
        })
        .collect()
}

/// Join, cap, and (optionally) volume-check.
pub fn match_allocations(
    demands: &[BranchDemand],
    availability: &BTreeMap<ProductId, f64>,
    snapshot: &FactSnapshot,
    respect_volume: bool,
) -> Vec<AllocationRow> {
    let free_volume = if respect_volume {
        Some(free_volume_by_branch(snapshot))
    } else {
        None
    };

    demands
        .iter()
        .filter_map(|d| {
            let available = *availability.get(&d.product_id)?;
            if available <= 0.0 {
                return None;
            }
            let qty = d.adjusted_demand.min(available);

            if let Some(free_volume) = &free_volume {
                let free = *free_volume.get(&d.branch_id)?;
                if free <= 0.0 || qty * snapshot.volume_per_unit(d.product_id) > free {
                    return None;
                }
            }

            Some(AllocationRow {
                branch_id: d.branch_id,
                product_id: d.product_id,
                demand: d.adjusted_demand,
                available,
                qty,
            })
        })
        .collect()
}
