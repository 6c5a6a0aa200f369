//! Fact rows as they come out of the store.
//!
//! Every struct mirrors one table. Nothing here is computed; the engine
//! reads these as immutable snapshots for a single run date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::{BranchId, CategoryId, ProductId};

/// Allowed replenishment cycle lengths, in days.
pub const ALLOWED_LOGDAYS: [u32; 3] = [7, 14, 21];

/// Lead time used when a (branch, category) pair has no profile.
pub const DEFAULT_LOGDAYS: u32 = 7;

/// Hub stock snapshot for a product on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubInventoryFact {
    pub product_id: ProductId,
    pub date: NaiveDate,
    pub stock: f64,
    pub reserved: f64,
    pub in_transit: f64,
}

impl HubInventoryFact {
    /// Supply free at the hub: stock minus reserved minus in-transit.
    ///
    /// May be negative when the hub is over-reserved.
    pub fn available(&self) -> f64 {
        self.stock - self.reserved - self.in_transit
    }
}

/// Branch stock snapshot for a product on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchInventoryFact {
    pub branch_id: BranchId,
    pub product_id: ProductId,
    pub date: NaiveDate,
    pub stock: f64,
    pub reserved: f64,
    pub in_transit: f64,
}

/// Target stock level a branch wants to hold for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRequirement {
    pub branch_id: BranchId,
    pub product_id: ProductId,
    pub needs: f64,
}

/// Smallest shipment a branch accepts for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimumShipment {
    pub branch_id: BranchId,
    pub product_id: ProductId,
    pub min_qty: f64,
}

/// Replenishment lead time for a (branch, category) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadTimeProfile {
    pub branch_id: BranchId,
    pub category_id: CategoryId,
    pub logdays: u32,
}

impl LeadTimeProfile {
    /// Whether `logdays` is one of the allowed cycle lengths.
    pub fn is_valid(&self) -> bool {
        ALLOWED_LOGDAYS.contains(&self.logdays)
    }
}

/// Category membership of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCategory {
    pub product_id: ProductId,
    pub category_id: CategoryId,
}

/// Total storage capacity of a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchStorageLimit {
    pub branch_id: BranchId,
    pub max_volume: f64,
}

/// Physical volume of one unit of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVolume {
    pub product_id: ProductId,
    pub volume_per_unit: f64,
}
