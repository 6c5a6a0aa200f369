//! Domain types for HubFlow

pub mod allocation;
pub mod facts;
pub mod ids;

pub use allocation::AllocationRow;
pub use facts::{
    BranchInventoryFact, BranchStorageLimit, DemandRequirement, HubInventoryFact,
    LeadTimeProfile, MinimumShipment, ProductCategory, ProductVolume, ALLOWED_LOGDAYS,
    DEFAULT_LOGDAYS,
};
pub use ids::{BranchId, CategoryId, ProductId};
