//! Run fingerprinting.
//!
//! A fingerprint is the BLAKE3 hash of the canonical JSON of the request and
//! the rows it produced. Same facts + same request ⇒ same fingerprint, which
//! is how repeated runs are checked for idempotence.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::AllocationRow;
use crate::query::AllocationRequest;

/// Hex-encoded BLAKE3 digest of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunFingerprint(pub String);

impl RunFingerprint {
    pub fn compute(
        request: &AllocationRequest,
        rows: &[AllocationRow],
    ) -> Result<Self, serde_json::Error> {
        // Struct fields serialize in declaration order, so this is stable
        let canonical = serde_json::json!({
            "request": request,
            "rows": rows,
        });
        let bytes = serde_json::to_vec(&canonical)?;
        Ok(Self(blake3::hash(&bytes).to_hex().to_string()))
    }

    /// First 12 hex chars, for display.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for RunFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BranchId, ProductId};
    use chrono::NaiveDate;

    fn request() -> AllocationRequest {
        AllocationRequest::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    fn rows(qty: f64) -> Vec<AllocationRow> {
        vec![AllocationRow {
            branch_id: BranchId::from_u128(1),
            product_id: ProductId::from_u128(2),
            demand: 50.0,
            available: 80.0,
            qty,
        }]
    }

    #[test]
    fn same_inputs_same_fingerprint() {
        let a = RunFingerprint::compute(&request(), &rows(50.0)).unwrap();
        let b = RunFingerprint::compute(&request(), &rows(50.0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn different_rows_or_request_change_fingerprint() {
        let base = RunFingerprint::compute(&request(), &rows(50.0)).unwrap();
        let other_rows = RunFingerprint::compute(&request(), &rows(49.0)).unwrap();
        let other_req = RunFingerprint::compute(&request().with_limit(1), &rows(50.0)).unwrap();
        assert_ne!(base, other_rows);
        assert_ne!(base, other_req);
    }
}
