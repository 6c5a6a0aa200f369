//! Schema introspection over the store, restricted to an allow-list.

use hubflow_core::data::{ParquetStore, StoreError};
use hubflow_core::query::{Identifier, TableRef};
use hubflow_core::schema::SchemaMeta;

/// `UnknownSchema` unless `schema` is on the allow-list.
pub fn check_allowed(allowed: &[Identifier], schema: &Identifier) -> Result<(), StoreError> {
    if allowed.contains(schema) {
        Ok(())
    } else {
        Err(StoreError::UnknownSchema(schema.to_string()))
    }
}

/// Allow-listed schemas that exist in the store, sorted.
pub fn list_schemas(store: &ParquetStore, allowed: &[Identifier]) -> Result<Vec<String>, StoreError> {
    Ok(store
        .schemas()?
        .into_iter()
        .filter(|s| allowed.contains(s))
        .map(|s| s.to_string())
        .collect())
}

/// Table names of one allow-listed schema, sorted.
pub fn list_tables(
    store: &ParquetStore,
    allowed: &[Identifier],
    schema: &Identifier,
) -> Result<Vec<String>, StoreError> {
    check_allowed(allowed, schema)?;
    Ok(store
        .tables(schema)?
        .into_iter()
        .map(|t| t.to_string())
        .collect())
}

/// Every table of `schema` with its columns.
pub fn schema_structure(
    store: &ParquetStore,
    allowed: &[Identifier],
    schema: &Identifier,
) -> Result<SchemaMeta, StoreError> {
    check_allowed(allowed, schema)?;
    let tables = store
        .tables(schema)?
        .into_iter()
        .map(|table| store.describe(&TableRef::new(schema.clone(), table)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SchemaMeta::new(schema.to_string(), tables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubflow_core::query::{SourceTables, TableKind};

    fn ident(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    fn store_with_tables() -> (tempfile::TempDir, ParquetStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let tables = SourceTables::default();
        store.create_schema(&tables.schema).unwrap();
        store.create_schema(&ident("staging")).unwrap();
        for kind in [TableKind::Needs, TableKind::LeadTime] {
            store.create_table(&tables.table(kind), kind).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn schemas_are_filtered_by_allow_list() {
        let (_dir, store) = store_with_tables();
        let listed = list_schemas(&store, &[ident("logistics")]).unwrap();
        assert_eq!(listed, vec!["logistics".to_string()]);
        let both = list_schemas(&store, &[ident("logistics"), ident("staging")]).unwrap();
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn structure_lists_tables_and_fields() {
        let (_dir, store) = store_with_tables();
        let meta = schema_structure(&store, &[ident("logistics")], &ident("logistics")).unwrap();
        let names: Vec<_> = meta.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["logdays", "needs"]);

        let needs = meta.table("needs").unwrap();
        let fields: Vec<_> = needs.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["branch_id", "product_id", "needs"]);
    }

    #[test]
    fn schema_outside_allow_list_is_unknown() {
        let (_dir, store) = store_with_tables();
        let err = schema_structure(&store, &[ident("logistics")], &ident("staging")).unwrap_err();
        assert!(matches!(err, StoreError::UnknownSchema(_)));
        assert!(list_tables(&store, &[ident("logistics")], &ident("staging")).is_err());
    }
}
