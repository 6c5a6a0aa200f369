//! Schema-qualified table references for one allocation run.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ident::{Identifier, IdentifierError};

/// The eight logical tables the engine reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    HubHistory,
    BranchHistory,
    Needs,
    MinShipment,
    ProductVolume,
    StorageLimit,
    Product,
    LeadTime,
}

impl TableKind {
    pub const ALL: [TableKind; 8] = [
        TableKind::HubHistory,
        TableKind::BranchHistory,
        TableKind::Needs,
        TableKind::MinShipment,
        TableKind::ProductVolume,
        TableKind::StorageLimit,
        TableKind::Product,
        TableKind::LeadTime,
    ];

    /// Physical table name used when the caller does not override it.
    pub fn default_name(self) -> &'static str {
        match self {
            TableKind::HubHistory => "rc_product_history",
            TableKind::BranchHistory => "branch_product_history",
            TableKind::Needs => "needs",
            TableKind::MinShipment => "min_shipment",
            TableKind::ProductVolume => "products_vol",
            TableKind::StorageLimit => "storage_limits",
            TableKind::Product => "products",
            TableKind::LeadTime => "logdays",
        }
    }
}

/// Default namespace holding the fact tables.
pub const DEFAULT_SCHEMA: &str = "logistics";

/// A validated `schema.table` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: Identifier,
    pub table: Identifier,
}

impl TableRef {
    pub fn new(schema: Identifier, table: Identifier) -> Self {
        Self { schema, table }
    }

    pub fn parse(schema: &str, table: &str) -> Result<Self, IdentifierError> {
        Ok(Self {
            schema: Identifier::parse(schema)?,
            table: Identifier::parse(table)?,
        })
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Where each logical table lives for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTables {
    pub schema: Identifier,
    pub hub_history: Identifier,
    pub branch_history: Identifier,
    pub needs: Identifier,
    pub min_shipment: Identifier,
    pub product_volume: Identifier,
    pub storage_limit: Identifier,
    pub product: Identifier,
    pub lead_time: Identifier,
}

impl Default for SourceTables {
    fn default() -> Self {
        let ident = Identifier::known;
        Self {
            schema: ident(DEFAULT_SCHEMA),
            hub_history: ident(TableKind::HubHistory.default_name()),
            branch_history: ident(TableKind::BranchHistory.default_name()),
            needs: ident(TableKind::Needs.default_name()),
            min_shipment: ident(TableKind::MinShipment.default_name()),
            product_volume: ident(TableKind::ProductVolume.default_name()),
            storage_limit: ident(TableKind::StorageLimit.default_name()),
            product: ident(TableKind::Product.default_name()),
            lead_time: ident(TableKind::LeadTime.default_name()),
        }
    }
}

impl SourceTables {
    /// Override the schema for every table.
    pub fn with_schema(mut self, schema: &str) -> Result<Self, IdentifierError> {
        self.schema = Identifier::parse(schema)?;
        Ok(self)
    }

    /// Override a single physical table name.
    pub fn with_table(mut self, kind: TableKind, name: &str) -> Result<Self, IdentifierError> {
        let ident = Identifier::parse(name)?;
        *self.slot_mut(kind) = ident;
        Ok(self)
    }

    pub fn name(&self, kind: TableKind) -> &Identifier {
        match kind {
            TableKind::HubHistory => &self.hub_history,
            TableKind::BranchHistory => &self.branch_history,
            TableKind::Needs => &self.needs,
            TableKind::MinShipment => &self.min_shipment,
            TableKind::ProductVolume => &self.product_volume,
            TableKind::StorageLimit => &self.storage_limit,
            TableKind::Product => &self.product,
            TableKind::LeadTime => &self.lead_time,
        }
    }

    fn slot_mut(&mut self, kind: TableKind) -> &mut Identifier {
        match kind {
            TableKind::HubHistory => &mut self.hub_history,
            TableKind::BranchHistory => &mut self.branch_history,
            TableKind::Needs => &mut self.needs,
            TableKind::MinShipment => &mut self.min_shipment,
            TableKind::ProductVolume => &mut self.product_volume,
            TableKind::StorageLimit => &mut self.storage_limit,
            TableKind::Product => &mut self.product,
            TableKind::LeadTime => &mut self.lead_time,
        }
    }

    /// Schema-qualified reference for a logical table.
    pub fn table(&self, kind: TableKind) -> TableRef {
        TableRef::new(self.schema.clone(), self.name(kind).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_logistics_layout() {
        let tables = SourceTables::default();
        assert_eq!(
            tables.table(TableKind::HubHistory).to_string(),
            "logistics.rc_product_history"
        );
        assert_eq!(tables.table(TableKind::LeadTime).to_string(), "logistics.logdays");
        for kind in TableKind::ALL {
            assert_eq!(tables.name(kind).as_str(), kind.default_name());
        }
    }

    #[test]
    fn overrides_apply_to_one_slot() {
        let tables = SourceTables::default()
            .with_schema("staging")
            .unwrap()
            .with_table(TableKind::Needs, "needs_v2")
            .unwrap();
        assert_eq!(tables.table(TableKind::Needs).to_string(), "staging.needs_v2");
        assert_eq!(
            tables.table(TableKind::MinShipment).to_string(),
            "staging.min_shipment"
        );
    }

    #[test]
    fn overrides_are_validated() {
        assert!(SourceTables::default()
            .with_table(TableKind::Product, "products; --")
            .is_err());
        assert!(SourceTables::default().with_schema("Logistics").is_err());
    }
}
