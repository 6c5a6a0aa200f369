//! One allocation run: acquire a store handle, allocate, fingerprint.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

use hubflow_core::domain::AllocationRow;
use hubflow_core::fingerprint::RunFingerprint;
use hubflow_core::{allocate, AllocationError, AllocationRequest};

use crate::pool::{PoolError, StorePool};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// The result of one run, with the request that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRun {
    pub request: AllocationRequest,
    pub rows: Vec<AllocationRow>,
    pub fingerprint: RunFingerprint,
}

impl AllocationRun {
    /// Total quantity shipped across all rows.
    pub fn total_qty(&self) -> f64 {
        self.rows.iter().map(|r| r.qty).sum()
    }
}

/// Run the engine against a pooled store handle.
///
/// The handle goes back to the pool when this returns, error or not.
pub fn run_allocation(pool: &StorePool, request: AllocationRequest) -> Result<AllocationRun, RunError> {
    let started = Instant::now();
    let store = pool.acquire()?;
    let rows = allocate(&*store, &request)?;
    drop(store);

    let fingerprint = RunFingerprint::compute(&request, &rows)?;
    tracing::info!(
        run_date = %request.run_date,
        rows = rows.len(),
        respect_volume = request.respect_volume,
        fingerprint = fingerprint.short(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "allocation run complete"
    );
    Ok(AllocationRun {
        request,
        rows,
        fingerprint,
    })
}
