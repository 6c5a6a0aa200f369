//! The full input of one allocation run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::filter::{AllocationFilter, FilterSet};
use super::tables::SourceTables;
use crate::engine::MinimumShipmentPolicy;

/// Everything the engine needs to know about a run, besides the facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub run_date: NaiveDate,
    #[serde(default)]
    pub filters: FilterSet,
    /// Maximum rows returned. `None` and `Some(0)` both mean unbounded.
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub respect_volume: bool,
    #[serde(default)]
    pub minimum_policy: MinimumShipmentPolicy,
    #[serde(default)]
    pub tables: SourceTables,
}

impl AllocationRequest {
    pub fn new(run_date: NaiveDate) -> Self {
        Self {
            run_date,
            filters: FilterSet::default(),
            limit: None,
            respect_volume: false,
            minimum_policy: MinimumShipmentPolicy::default(),
            tables: SourceTables::default(),
        }
    }

    /// Request for the local calendar date.
    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }

    pub fn with_filter(mut self, filter: AllocationFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_volume(mut self, respect_volume: bool) -> Self {
        self.respect_volume = respect_volume;
        self
    }

    pub fn with_policy(mut self, policy: MinimumShipmentPolicy) -> Self {
        self.minimum_policy = policy;
        self
    }

    pub fn with_tables(mut self, tables: SourceTables) -> Self {
        self.tables = tables;
        self
    }

    /// Effective row cap after normalising the zero sentinel.
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|&n| n > 0)
    }
}

impl Default for AllocationRequest {
    fn default() -> Self {
        Self::today()
    }
}
