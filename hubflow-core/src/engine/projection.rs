//! Stage 4: caller predicates, ordering, row limit.

use crate::domain::AllocationRow;
use crate::query::FilterSet;
use crate::snapshot::FactSnapshot;

/// Apply `filters`, sort by (product_id, branch_id) ascending, then truncate.
///
/// `limit` of `None` or `Some(0)` returns every row.
pub fn project(
    mut rows: Vec<AllocationRow>,
    filters: &FilterSet,
    snapshot: &FactSnapshot,
    limit: Option<usize>,
) -> Vec<AllocationRow> {
    rows.retain(|row| filters.matches(row, snapshot.category(row.product_id)));
    rows.sort_by(|a, b| {
        a.product_id
            .cmp(&b.product_id)
            .then_with(|| a.branch_id.cmp(&b.branch_id))
    });
    if let Some(n) = limit.filter(|&n| n > 0) {
        rows.truncate(n);
    }
    rows
}
