//! Allocation engine: four pure stages over a `FactSnapshot`.
//!
//! 1. Hub availability: free supply per product on the run date
//! 2. Branch demand: shortfall, minimum-shipment policy, lead-time inflation
//! 3. Matcher: join with supply, cap at availability, optional volume check
//! 4. Projection: filters, ordering, limit
//!
//! Data flows strictly forward. The engine performs no writes and keeps no
//! state between calls.

pub mod demand;
pub mod hub;
pub mod matcher;
pub mod projection;

pub use demand::{lead_time_factor, resolve_branch_demand, BranchDemand, MinimumShipmentPolicy};
pub use hub::aggregate_hub_availability;
pub use matcher::{free_volume_by_branch, match_allocations};
pub use projection::project;

use thiserror::Error;

use crate::data::{FactSource, StoreError};
use crate::domain::AllocationRow;
use crate::query::AllocationRequest;
use crate::snapshot::FactSnapshot;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run the pipeline over an already loaded snapshot.
pub fn allocate_snapshot(snapshot: &FactSnapshot, request: &AllocationRequest) -> Vec<AllocationRow> {
    let availability = aggregate_hub_availability(snapshot.hub_facts(), request.run_date);
    let demands = resolve_branch_demand(snapshot, request.minimum_policy);
    let matched = match_allocations(&demands, &availability, snapshot, request.respect_volume);
    let matched_count = matched.len();
    let rows = project(matched, &request.filters, snapshot, request.limit);

    tracing::debug!(
        products = availability.len(),
        demands = demands.len(),
        matched = matched_count,
        returned = rows.len(),
        "allocation stages complete"
    );

    rows
}

/// Load the facts for `request` from `source` and allocate.
///
/// Either the full result or an error; never a partial plan.
pub fn allocate<S: FactSource + ?Sized>(
    source: &S,
    request: &AllocationRequest,
) -> Result<Vec<AllocationRow>, AllocationError> {
    let snapshot = FactSnapshot::load(source, request)?;
    Ok(allocate_snapshot(&snapshot, request))
}
