//! Fact source trait and structured storage errors.
//!
//! `FactSource` abstracts over where the fact tables live (the Parquet store,
//! an in-memory fixture) so the engine never sees a file or a connection.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{
    BranchInventoryFact, BranchStorageLimit, DemandRequirement, HubInventoryFact,
    LeadTimeProfile, MinimumShipment, ProductCategory, ProductVolume,
};
use crate::query::{IdentifierError, TableRef};

/// Everything that can go wrong between a table reference and typed rows.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("table '{table}' is missing column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("malformed row {row} in '{table}': {reason}")]
    MalformedRow {
        table: String,
        row: usize,
        reason: String,
    },

    #[error("constraint violation in '{table}': {reason}")]
    Constraint { table: String, reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the caller naming something that does not exist
    /// or cannot exist, as opposed to a broken store.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::UnknownSchema(_) | StoreError::UnknownTable(_)
        )
    }
}

/// Typed, read-only access to the eight fact tables.
///
/// Implementations return every row of the named table (date-filtered for
/// the two history tables) in table order. Duplicate handling is the
/// snapshot's job, not the source's.
pub trait FactSource {
    fn hub_inventory(
        &self,
        table: &TableRef,
        date: NaiveDate,
    ) -> Result<Vec<HubInventoryFact>, StoreError>;

    fn branch_inventory(
        &self,
        table: &TableRef,
        date: NaiveDate,
    ) -> Result<Vec<BranchInventoryFact>, StoreError>;

    fn demand_requirements(&self, table: &TableRef) -> Result<Vec<DemandRequirement>, StoreError>;

    fn minimum_shipments(&self, table: &TableRef) -> Result<Vec<MinimumShipment>, StoreError>;

    fn lead_times(&self, table: &TableRef) -> Result<Vec<LeadTimeProfile>, StoreError>;

    fn product_categories(&self, table: &TableRef) -> Result<Vec<ProductCategory>, StoreError>;

    fn storage_limits(&self, table: &TableRef) -> Result<Vec<BranchStorageLimit>, StoreError>;

    fn product_volumes(&self, table: &TableRef) -> Result<Vec<ProductVolume>, StoreError>;
}

impl<T: FactSource + ?Sized> FactSource for &T {
    fn hub_inventory(
        &self,
        table: &TableRef,
        date: NaiveDate,
    ) -> Result<Vec<HubInventoryFact>, StoreError> {
        (**self).hub_inventory(table, date)
    }

    fn branch_inventory(
        &self,
        table: &TableRef,
        date: NaiveDate,
    ) -> Result<Vec<BranchInventoryFact>, StoreError> {
        (**self).branch_inventory(table, date)
    }

    fn demand_requirements(&self, table: &TableRef) -> Result<Vec<DemandRequirement>, StoreError> {
        (**self).demand_requirements(table)
    }

    fn minimum_shipments(&self, table: &TableRef) -> Result<Vec<MinimumShipment>, StoreError> {
        (**self).minimum_shipments(table)
    }

    fn lead_times(&self, table: &TableRef) -> Result<Vec<LeadTimeProfile>, StoreError> {
        (**self).lead_times(table)
    }

    fn product_categories(&self, table: &TableRef) -> Result<Vec<ProductCategory>, StoreError> {
        (**self).product_categories(table)
    }

    fn storage_limits(&self, table: &TableRef) -> Result<Vec<BranchStorageLimit>, StoreError> {
        (**self).storage_limits(table)
    }

    fn product_volumes(&self, table: &TableRef) -> Result<Vec<ProductVolume>, StoreError> {
        (**self).product_volumes(table)
    }
}

/// In-memory fact set, used by tests and benches.
///
/// Table names are not consulted; every read returns the matching field.
/// History reads still filter by date.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFacts {
    pub hub: Vec<HubInventoryFact>,
    pub branch: Vec<BranchInventoryFact>,
    pub needs: Vec<DemandRequirement>,
    pub minimums: Vec<MinimumShipment>,
    pub lead_times: Vec<LeadTimeProfile>,
    pub categories: Vec<ProductCategory>,
    pub storage_limits: Vec<BranchStorageLimit>,
    pub volumes: Vec<ProductVolume>,
}

impl FactSource for InMemoryFacts {
    fn hub_inventory(
        &self,
        _table: &TableRef,
        date: NaiveDate,
    ) -> Result<Vec<HubInventoryFact>, StoreError> {
        Ok(self.hub.iter().filter(|f| f.date == date).cloned().collect())
    }

    fn branch_inventory(
        &self,
        _table: &TableRef,
        date: NaiveDate,
    ) -> Result<Vec<BranchInventoryFact>, StoreError> {
        Ok(self
            .branch
            .iter()
            .filter(|f| f.date == date)
            .cloned()
            .collect())
    }

    fn demand_requirements(&self, _table: &TableRef) -> Result<Vec<DemandRequirement>, StoreError> {
        Ok(self.needs.clone())
    }

    fn minimum_shipments(&self, _table: &TableRef) -> Result<Vec<MinimumShipment>, StoreError> {
        Ok(self.minimums.clone())
    }

    fn lead_times(&self, _table: &TableRef) -> Result<Vec<LeadTimeProfile>, StoreError> {
        Ok(self.lead_times.clone())
    }

    fn product_categories(&self, _table: &TableRef) -> Result<Vec<ProductCategory>, StoreError> {
        Ok(self.categories.clone())
    }

    fn storage_limits(&self, _table: &TableRef) -> Result<Vec<BranchStorageLimit>, StoreError> {
        Ok(self.storage_limits.clone())
    }

    fn product_volumes(&self, _table: &TableRef) -> Result<Vec<ProductVolume>, StoreError> {
        Ok(self.volumes.clone())
    }
}
