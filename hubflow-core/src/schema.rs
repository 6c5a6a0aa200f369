//! Schema introspection types.
//!
//! These are what `/manage/schemas/{schema}/tables` returns: one entry per
//! table, sorted by name, fields in storage order.

use serde::{Deserialize, Serialize};

/// A single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// A table and its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub fields: Vec<FieldMeta>,
}

/// All tables of one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMeta {
    pub schema: String,
    pub tables: Vec<TableMeta>,
}

impl SchemaMeta {
    /// Build from unsorted tables; sorts by table name.
    pub fn new(schema: impl Into<String>, mut tables: Vec<TableMeta>) -> Self {
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            schema: schema.into(),
            tables,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableMeta> {
        self.tables.iter().find(|t| t.name == name)
    }
}
