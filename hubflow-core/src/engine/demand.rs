//! Stage 2: per-branch demand.
//!
//! For each (branch, product) with a demand requirement:
//! 1. baseline shortfall `max(needs − stock − in_transit, 0)`
//! 2. minimum-shipment handling (the pair must have a minimum row)
//! 3. lead-time inflation `demand × (1 + logdays / 30)`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{BranchId, ProductId};
use crate::snapshot::FactSnapshot;

/// Days in the month used to scale lead time into a demand multiplier.
pub const DAYS_PER_MONTH: f64 = 30.0;

/// How `min_qty` interacts with the baseline shortfall.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinimumShipmentPolicy {
    /// Raise demand to `min_qty`. A branch with no shortfall still gets `min_qty`.
    #[default]
    Clamp,
    /// Keep only positive shortfalls that already reach `min_qty`.
    Filter,
}

impl fmt::Display for MinimumShipmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinimumShipmentPolicy::Clamp => write!(f, "clamp"),
            MinimumShipmentPolicy::Filter => write!(f, "filter"),
        }
    }
}

impl FromStr for MinimumShipmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(MinimumShipmentPolicy::Clamp),
            "filter" => Ok(MinimumShipmentPolicy::Filter),
            other => Err(format!(
                "unknown minimum policy '{other}' (expected clamp or filter)"
            )),
        }
    }
}

/// Resolved demand of one branch for one product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchDemand {
    pub branch_id: BranchId,
    pub product_id: ProductId,
    pub base_demand: f64,
    /// After minimum-shipment handling, before lead-time inflation.
    pub demand: f64,
    pub logdays: u32,
    pub adjusted_demand: f64,
}

/// `demand × (1 + logdays / 30)`.
pub fn lead_time_factor(logdays: u32) -> f64 {
    1.0 + f64::from(logdays) / DAYS_PER_MONTH
}

/// Resolve demand for every requirement in the snapshot, ordered by (branch, product).
pub fn resolve_branch_demand(
    snapshot: &FactSnapshot,
    policy: MinimumShipmentPolicy,
) -> Vec<BranchDemand> {
    snapshot
        .demand_requirements()
        .filter_map(|req| {
            let pos = snapshot.branch_position(req.branch_id, req.product_id);
            let base_demand = (req.needs - pos.stock - pos.in_transit).max(0.0);
            let min_qty = snapshot.minimum_shipment(req.branch_id, req.product_id)?;

            let demand = match policy {
                MinimumShipmentPolicy::Clamp => base_demand.max(min_qty),
                MinimumShipmentPolicy::Filter => {
                    if base_demand > 0.0 && base_demand >= min_qty {
                        base_demand
                    } else {
                        return None;
                    }
                }
            };

            let logdays = snapshot.logdays(req.branch_id, req.product_id);
            Some(BranchDemand {
                branch_id: req.branch_id,
                product_id: req.product_id,
                base_demand,
                demand,
                logdays,
                adjusted_demand: demand * lead_time_factor(logdays),
            })
        })
        .collect()
}
