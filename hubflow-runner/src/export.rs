//! Export of allocation results.
//!
//! - **CSV**: one line per row, `branch_id,product_id,demand,available,qty`
//! - **JSON**: the full `AllocationRun` (request, rows, fingerprint), pretty
//!
//! Quantities are written with two decimals in CSV; JSON keeps full precision.

use std::path::Path;

use anyhow::{Context, Result};
use hubflow_core::domain::AllocationRow;

use crate::runner::AllocationRun;

// ─── CSV export ─────────────────────────────────────────────────────

pub fn rows_to_csv(rows: &[AllocationRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["branch_id", "product_id", "demand", "available", "qty"])?;
    for r in rows {
        wtr.write_record([
            r.branch_id.to_string(),
            r.product_id.to_string(),
            format!("{:.2}", r.demand),
            format!("{:.2}", r.available),
            format!("{:.2}", r.qty),
        ])?;
    }
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

// ─── JSON export ────────────────────────────────────────────────────

/// Rows as a JSON array, the shape `/distribution` returns.
pub fn rows_to_json(rows: &[AllocationRow]) -> Result<String> {
    serde_json::to_string_pretty(rows).context("failed to serialize allocation rows")
}

/// A whole run, including its request and fingerprint.
pub fn run_to_json(run: &AllocationRun) -> Result<String> {
    serde_json::to_string_pretty(run).context("failed to serialize allocation run")
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
