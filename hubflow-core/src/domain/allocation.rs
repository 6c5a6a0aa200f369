use serde::{Deserialize, Serialize};

use super::ids::{BranchId, ProductId};

/// One computed shipment line from the hub to a branch.
///
/// `demand` is the lead-time adjusted demand. `qty` never exceeds either
/// `demand` or `available` and is never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub branch_id: BranchId,
    pub product_id: ProductId,
    pub demand: f64,
    pub available: f64,
    pub qty: f64,
}
