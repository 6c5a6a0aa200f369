//! HubFlow Core: hub-to-branch distribution allocation.
//!
//! This crate contains the allocation engine and everything it reads:
//! - Domain types (fact rows, identifiers, allocation rows)
//! - Typed queries with validated schema/table names and composable filters
//! - The `FactSource` trait and the Parquet table store
//! - Per-run fact snapshots with explicit lookup defaults
//! - The four-stage engine (hub supply, branch demand, matcher, projection)
//! - Run fingerprints and schema introspection types

pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod query;
pub mod schema;
pub mod snapshot;

pub use engine::{allocate, AllocationError, MinimumShipmentPolicy};
pub use query::AllocationRequest;
pub use snapshot::FactSnapshot;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything that crosses a thread boundary is Send + Sync.
    ///
    /// The HTTP layer runs allocations on blocking worker threads and the
    /// dashboard ships results back over a channel.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::AllocationRow>();
        require_sync::<domain::AllocationRow>();
        require_send::<domain::HubInventoryFact>();
        require_sync::<domain::HubInventoryFact>();
        require_send::<domain::BranchInventoryFact>();
        require_sync::<domain::BranchInventoryFact>();

        // Query types
        require_send::<query::AllocationRequest>();
        require_sync::<query::AllocationRequest>();
        require_send::<query::SourceTables>();
        require_sync::<query::SourceTables>();

        // Data layer
        require_send::<data::ParquetStore>();
        require_sync::<data::ParquetStore>();
        require_send::<data::StoreError>();
        require_sync::<data::StoreError>();
        require_send::<snapshot::FactSnapshot>();
        require_sync::<snapshot::FactSnapshot>();

        // Engine
        require_send::<engine::AllocationError>();
        require_sync::<engine::AllocationError>();
        require_send::<fingerprint::RunFingerprint>();
        require_sync::<fingerprint::RunFingerprint>();
    }
}
