//! Typed result predicates.
//!
//! Filters are independent and combined by conjunction, so the order in
//! which they are added never changes the result.

use serde::{Deserialize, Serialize};

use crate::domain::{AllocationRow, BranchId, CategoryId, ProductId};

/// A single predicate over an allocation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AllocationFilter {
    Branch(BranchId),
    Product(ProductId),
    /// Requires the product to have a category row; uncategorised products never match.
    Category(CategoryId),
    /// Lower bound (inclusive) on adjusted demand.
    MinDemand(f64),
}

impl AllocationFilter {
    /// Evaluate against a row. `category` is the product's category, if known.
    pub fn matches(&self, row: &AllocationRow, category: Option<CategoryId>) -> bool {
        match self {
            AllocationFilter::Branch(id) => row.branch_id == *id,
            AllocationFilter::Product(id) => row.product_id == *id,
            AllocationFilter::Category(id) => category == Some(*id),
            AllocationFilter::MinDemand(min) => row.demand >= *min,
        }
    }

    pub fn needs_category(&self) -> bool {
        matches!(self, AllocationFilter::Category(_))
    }
}

/// Conjunction of filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    filters: Vec<AllocationFilter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: AllocationFilter) {
        self.filters.push(filter);
    }

    pub fn with(mut self, filter: AllocationFilter) -> Self {
        self.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AllocationFilter> {
        self.filters.iter()
    }

    /// True when every filter accepts the row. An empty set accepts everything.
    pub fn matches(&self, row: &AllocationRow, category: Option<CategoryId>) -> bool {
        self.filters.iter().all(|f| f.matches(row, category))
    }
}

impl FromIterator<AllocationFilter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = AllocationFilter>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}
