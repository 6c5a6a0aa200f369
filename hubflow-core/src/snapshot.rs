//! In-memory facts for one run date.
//!
//! The snapshot is the data-access boundary: it reads each table once,
//! collapses duplicates, and exposes explicit lookups with defaults. Nothing
//! downstream ever sees a missing row as a null.
//!
//! Duplicate keys: history rows for the same key are summed; for the static
//! tables the last row in table order wins.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::data::{FactSource, StoreError};
use crate::domain::{
    BranchId, CategoryId, DemandRequirement, HubInventoryFact, ProductId, DEFAULT_LOGDAYS,
};
use crate::query::{AllocationRequest, TableKind};

/// Stock position of a branch for one product. Absent rows read as all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BranchPosition {
    pub stock: f64,
    pub reserved: f64,
    pub in_transit: f64,
}

/// Everything the engine reads for one run.
#[derive(Debug, Clone, Default)]
pub struct FactSnapshot {
    pub run_date: NaiveDate,
    hub: Vec<HubInventoryFact>,
    branch: BTreeMap<(BranchId, ProductId), BranchPosition>,
    needs: BTreeMap<(BranchId, ProductId), f64>,
    minimums: BTreeMap<(BranchId, ProductId), f64>,
    lead_times: BTreeMap<(BranchId, CategoryId), u32>,
    categories: BTreeMap<ProductId, CategoryId>,
    storage_limits: BTreeMap<BranchId, f64>,
    volumes: BTreeMap<ProductId, f64>,
}

impl FactSnapshot {
    /// Read every table the request needs. Volume tables are only read in
    /// volume mode.
    pub fn load<S: FactSource + ?Sized>(
        source: &S,
        request: &AllocationRequest,
    ) -> Result<Self, StoreError> {
        let tables = &request.tables;
        let date = request.run_date;

        let mut snap = FactSnapshot {
            run_date: date,
            ..Default::default()
        };

        snap.hub = source.hub_inventory(&tables.table(TableKind::HubHistory), date)?;

        // Same-date duplicates collapse into one position
        for row in source.branch_inventory(&tables.table(TableKind::BranchHistory), date)? {
            let pos = snap.branch.entry((row.branch_id, row.product_id)).or_default();
            pos.stock += row.stock;
            pos.reserved += row.reserved;
            pos.in_transit += row.in_transit;
        }

        for row in source.demand_requirements(&tables.table(TableKind::Needs))? {
            snap.needs.insert((row.branch_id, row.product_id), row.needs);
        }
        for row in source.minimum_shipments(&tables.table(TableKind::MinShipment))? {
            snap.minimums.insert((row.branch_id, row.product_id), row.min_qty);
        }
        for row in source.product_categories(&tables.table(TableKind::Product))? {
            snap.categories.insert(row.product_id, row.category_id);
        }
        for row in source.lead_times(&tables.table(TableKind::LeadTime))? {
            snap.lead_times
                .insert((row.branch_id, row.category_id), row.logdays);
        }

        if request.respect_volume {
            for row in source.storage_limits(&tables.table(TableKind::StorageLimit))? {
                snap.storage_limits.insert(row.branch_id, row.max_volume);
            }
            for row in source.product_volumes(&tables.table(TableKind::ProductVolume))? {
                snap.volumes.insert(row.product_id, row.volume_per_unit);
            }
        }

        tracing::debug!(
            run_date = %date,
            hub_rows = snap.hub.len(),
            branch_positions = snap.branch.len(),
            needs = snap.needs.len(),
            minimums = snap.minimums.len(),
            volume_mode = request.respect_volume,
            "snapshot loaded"
        );

        Ok(snap)
    }

    /// Hub rows for the run date, in table order.
    pub fn hub_facts(&self) -> &[HubInventoryFact] {
        &self.hub
    }

    /// Branch position, defaulting to zero when the branch has no row.
    pub fn branch_position(&self, branch: BranchId, product: ProductId) -> BranchPosition {
        self.branch
            .get(&(branch, product))
            .copied()
            .unwrap_or_default()
    }

    /// Every branch position on the run date.
    pub fn branch_positions(
        &self,
    ) -> impl Iterator<Item = (BranchId, ProductId, BranchPosition)> + '_ {
        self.branch.iter().map(|(&(b, p), &pos)| (b, p, pos))
    }

    /// Demand requirements after duplicate collapse, ordered by (branch, product).
    pub fn demand_requirements(&self) -> impl Iterator<Item = DemandRequirement> + '_ {
        self.needs
            .iter()
            .map(|(&(branch_id, product_id), &needs)| DemandRequirement {
                branch_id,
                product_id,
                needs,
            })
    }

    pub fn minimum_shipment(&self, branch: BranchId, product: ProductId) -> Option<f64> {
        self.minimums.get(&(branch, product)).copied()
    }

    pub fn category(&self, product: ProductId) -> Option<CategoryId> {
        self.categories.get(&product).copied()
    }

    /// Lead time for a branch and product, defaulting to `DEFAULT_LOGDAYS`
    /// when the product has no category or the pair has no profile.
    pub fn logdays(&self, branch: BranchId, product: ProductId) -> u32 {
        self.category(product)
            .and_then(|cat| self.lead_times.get(&(branch, cat)).copied())
            .unwrap_or(DEFAULT_LOGDAYS)
    }

    pub fn storage_limit(&self, branch: BranchId) -> Option<f64> {
        self.storage_limits.get(&branch).copied()
    }

    /// Storage limits read in volume mode, ordered by branch.
    pub fn storage_limits(&self) -> impl Iterator<Item = (BranchId, f64)> + '_ {
        self.storage_limits.iter().map(|(&b, &v)| (b, v))
    }

    /// Volume per unit, zero when unknown.
    pub fn volume_per_unit(&self, product: ProductId) -> f64 {
        self.volumes.get(&product).copied().unwrap_or(0.0)
    }
}
