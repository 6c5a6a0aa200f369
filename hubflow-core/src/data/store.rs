//! Parquet-backed table store.
//!
//! Layout: `{root}/{schema}/{table}.parquet`
//!
//! - The catalog is the set of schema directories and table files on disk.
//!   Every read resolves its `TableRef` against the catalog first, so only
//!   tables that already exist are ever opened.
//! - Writes are atomic (write to .tmp, rename into place). A table is always
//!   replaced as a whole; there is no append.

use chrono::NaiveDate;
use polars::io::parquet::write::BatchedWriter as ParquetBatchedWriter;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::frames::{self, FactRecord};
use super::source::{FactSource, StoreError};
use crate::domain::{
    BranchInventoryFact, BranchStorageLimit, DemandRequirement, HubInventoryFact,
    LeadTimeProfile, MinimumShipment, ProductCategory, ProductVolume,
};
use crate::query::{Identifier, TableKind, TableRef};
use crate::schema::{FieldMeta, TableMeta};

const EXTENSION: &str = "parquet";

/// The Parquet store.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn schema_dir(&self, schema: &Identifier) -> PathBuf {
        self.root.join(schema.as_str())
    }

    fn table_path(&self, table: &TableRef) -> PathBuf {
        self.schema_dir(&table.schema)
            .join(format!("{}.{EXTENSION}", table.table))
    }

    // ── Catalog ─────────────────────────────────────────────────────

    /// Schemas present on disk, sorted. Directories whose names are not
    /// valid identifiers are ignored.
    pub fn schemas(&self) -> Result<Vec<Identifier>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(ident) = entry.file_name().to_str().and_then(|n| Identifier::parse(n).ok()) {
                out.push(ident);
            }
        }
        out.sort();
        Ok(out)
    }

    /// Tables present in a schema, sorted.
    pub fn tables(&self, schema: &Identifier) -> Result<Vec<Identifier>, StoreError> {
        let dir = self.schema_dir(schema);
        if !dir.is_dir() {
            return Err(StoreError::UnknownSchema(schema.to_string()));
        }
        let entries = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let path = entry.path();
            // Skip .tmp leftovers and anything else that isn't a table
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(ident) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Identifier::parse(s).ok())
            {
                out.push(ident);
            }
        }
        out.sort();
        Ok(out)
    }

    /// Full catalog: schema → tables.
    pub fn catalog(&self) -> Result<BTreeMap<Identifier, Vec<Identifier>>, StoreError> {
        let mut out = BTreeMap::new();
        for schema in self.schemas()? {
            let tables = self.tables(&schema)?;
            out.insert(schema, tables);
        }
        Ok(out)
    }

    /// Check a reference against the catalog and return its file path.
    fn resolve(&self, table: &TableRef) -> Result<PathBuf, StoreError> {
        if !self.schema_dir(&table.schema).is_dir() {
            return Err(StoreError::UnknownSchema(table.schema.to_string()));
        }
        let known = self.tables(&table.schema)?;
        if !known.contains(&table.table) {
            return Err(StoreError::UnknownTable(table.to_string()));
        }
        Ok(self.table_path(table))
    }

    pub fn exists(&self, table: &TableRef) -> bool {
        self.table_path(table).is_file()
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Load a whole table as a DataFrame.
    pub fn read_frame(&self, table: &TableRef) -> Result<DataFrame, StoreError> {
        let path = self.resolve(table)?;
        let file = fs::File::open(&path).map_err(|e| StoreError::io(&path, e))?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| StoreError::Parquet(format!("read {table}: {e}")))
    }

    /// Load a whole table as typed rows.
    pub fn read<R: FactRecord>(&self, table: &TableRef) -> Result<Vec<R>, StoreError> {
        let df = self.read_frame(table)?;
        let rows = R::from_frame(&df, &table.to_string())?;
        tracing::debug!(table = %table, rows = rows.len(), "table read");
        Ok(rows)
    }

    /// Column names and types of a table, in storage order.
    pub fn describe(&self, table: &TableRef) -> Result<TableMeta, StoreError> {
        let df = self.read_frame(table)?;
        let fields = df
            .get_columns()
            .iter()
            .map(|c| FieldMeta {
                name: c.name().to_string(),
                data_type: c.dtype().to_string(),
            })
            .collect();
        Ok(TableMeta {
            name: table.table.to_string(),
            fields,
        })
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Create the schema directory if it does not exist.
    pub fn create_schema(&self, schema: &Identifier) -> Result<(), StoreError> {
        let dir = self.schema_dir(schema);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))
    }

    /// Create an empty table of the given kind unless it already exists.
    ///
    /// Returns true when the table was created.
    pub fn create_table(&self, table: &TableRef, kind: TableKind) -> Result<bool, StoreError> {
        if self.exists(table) {
            return Ok(false);
        }
        if !self.schema_dir(&table.schema).is_dir() {
            return Err(StoreError::UnknownSchema(table.schema.to_string()));
        }
        TableWriter::create(self, table, frames::empty_frame(kind)?)?.commit()?;
        Ok(true)
    }

    /// Start replacing a table. Nothing is visible until `commit`.
    pub fn replace<R: FactRecord>(&self, table: &TableRef) -> Result<TableWriter, StoreError> {
        if !self.schema_dir(&table.schema).is_dir() {
            return Err(StoreError::UnknownSchema(table.schema.to_string()));
        }
        TableWriter::create(self, table, R::to_frame(&[])?)
    }

    /// Replace a table with `rows` in one go.
    pub fn write<R: FactRecord>(&self, table: &TableRef, rows: &[R]) -> Result<usize, StoreError> {
        let mut writer = self.replace::<R>(table)?;
        writer.write(rows)?;
        writer.commit()
    }
}

/// Streams row chunks into a temporary Parquet file, renamed into place on commit.
///
/// Dropping an uncommitted writer, or a failed commit, removes the temporary
/// file and leaves the existing table untouched.
pub struct TableWriter {
    inner: Option<ParquetBatchedWriter<fs::File>>,
    committed: bool,
    tmp_path: PathBuf,
    path: PathBuf,
    table: String,
    rows: usize,
}

impl TableWriter {
    fn create(store: &ParquetStore, table: &TableRef, template: DataFrame) -> Result<Self, StoreError> {
        let path = store.table_path(table);
        let tmp_path = path.with_extension(format!("{EXTENSION}.tmp"));
        let file = fs::File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        let inner = ParquetWriter::new(file)
            .batched(&template.schema())
            .map_err(|e| StoreError::Parquet(format!("open writer for {table}: {e}")))?;
        Ok(Self {
            inner: Some(inner),
            committed: false,
            tmp_path,
            path,
            table: table.to_string(),
            rows: 0,
        })
    }

    /// Append one chunk of typed rows.
    pub fn write<R: FactRecord>(&mut self, rows: &[R]) -> Result<(), StoreError> {
        let df = R::to_frame(rows)?;
        self.write_frame(&df)
    }

    fn write_frame(&mut self, df: &DataFrame) -> Result<(), StoreError> {
        if df.height() == 0 {
            return Ok(());
        }
        let Some(inner) = self.inner.as_mut() else {
            return Err(StoreError::Parquet(format!("writer for {} already closed", self.table)));
        };
        inner
            .write_batch(df)
            .map_err(|e| StoreError::Parquet(format!("write {}: {e}", self.table)))?;
        self.rows += df.height();
        Ok(())
    }

    /// Rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Finish the file and atomically replace the table. Returns the row count.
    pub fn commit(mut self) -> Result<usize, StoreError> {
        if let Some(mut inner) = self.inner.take() {
            inner
                .finish()
                .map_err(|e| StoreError::Parquet(format!("finish {}: {e}", self.table)))?;
        }
        fs::rename(&self.tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        self.committed = true;
        Ok(self.rows)
    }
}

impl Drop for TableWriter {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

impl FactSource for ParquetStore {
    fn hub_inventory(
        &self,
        table: &TableRef,
        date: NaiveDate,
    ) -> Result<Vec<HubInventoryFact>, StoreError> {
        let mut rows: Vec<HubInventoryFact> = self.read(table)?;
        rows.retain(|r| r.date == date);
        Ok(rows)
    }

    fn branch_inventory(
        &self,
        table: &TableRef,
        date: NaiveDate,
    ) -> Result<Vec<BranchInventoryFact>, StoreError> {
        let mut rows: Vec<BranchInventoryFact> = self.read(table)?;
        rows.retain(|r| r.date == date);
        Ok(rows)
    }

    fn demand_requirements(&self, table: &TableRef) -> Result<Vec<DemandRequirement>, StoreError> {
        self.read(table)
    }

    fn minimum_shipments(&self, table: &TableRef) -> Result<Vec<MinimumShipment>, StoreError> {
        self.read(table)
    }

    fn lead_times(&self, table: &TableRef) -> Result<Vec<LeadTimeProfile>, StoreError> {
        self.read(table)
    }

    fn product_categories(&self, table: &TableRef) -> Result<Vec<ProductCategory>, StoreError> {
        self.read(table)
    }

    fn storage_limits(&self, table: &TableRef) -> Result<Vec<BranchStorageLimit>, StoreError> {
        self.read(table)
    }

    fn product_volumes(&self, table: &TableRef) -> Result<Vec<ProductVolume>, StoreError> {
        self.read(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BranchId, ProductId};
    use crate::query::SourceTables;

    fn store() -> (tempfile::TempDir, ParquetStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        store.create_schema(&Identifier::parse("logistics").unwrap()).unwrap();
        (dir, store)
    }

    fn needs_ref() -> TableRef {
        SourceTables::default().table(TableKind::Needs)
    }

    fn needs_rows(n: u128) -> Vec<DemandRequirement> {
        (0..n)
            .map(|i| DemandRequirement {
                branch_id: BranchId::from_u128(i),
                product_id: ProductId::from_u128(100 + i),
                needs: i as f64 * 1.5,
            })
            .collect()
    }

    #[test]
    fn write_and_read_roundtrip() {
        let (_dir, store) = store();
        let rows = needs_rows(3);
        assert_eq!(store.write(&needs_ref(), &rows).unwrap(), 3);
        let back: Vec<DemandRequirement> = store.read(&needs_ref()).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn chunked_writes_accumulate() {
        let (_dir, store) = store();
        let rows = needs_rows(10);
        let mut writer = store.replace::<DemandRequirement>(&needs_ref()).unwrap();
        for chunk in rows.chunks(4) {
            writer.write(chunk).unwrap();
        }
        assert_eq!(writer.commit().unwrap(), 10);
        let back: Vec<DemandRequirement> = store.read(&needs_ref()).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn dropped_writer_keeps_old_table() {
        let (_dir, store) = store();
        store.write(&needs_ref(), &needs_rows(2)).unwrap();
        {
            let mut writer = store.replace::<DemandRequirement>(&needs_ref()).unwrap();
            writer.write(&needs_rows(5)).unwrap();
        }
        let back: Vec<DemandRequirement> = store.read(&needs_ref()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(store.tables(&needs_ref().schema).unwrap().len(), 1);
    }

    #[test]
    fn failed_commit_removes_tmp_file() {
        let (dir, store) = store();
        // A directory in the table's place makes the rename fail
        let blocker = dir.path().join("logistics").join("needs.parquet");
        fs::create_dir_all(blocker.join("occupied")).unwrap();

        let mut writer = store.replace::<DemandRequirement>(&needs_ref()).unwrap();
        writer.write(&needs_rows(3)).unwrap();
        assert!(matches!(writer.commit(), Err(StoreError::Io { .. })));

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("logistics"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
    }

    #[test]
    fn unknown_table_and_schema() {
        let (_dir, store) = store();
        let err = store.read_frame(&needs_ref()).unwrap_err();
        assert!(matches!(err, StoreError::UnknownTable(_)));

        let other = TableRef::parse("staging", "needs").unwrap();
        let err = store.read_frame(&other).unwrap_err();
        assert!(matches!(err, StoreError::UnknownSchema(_)));
    }

    #[test]
    fn create_table_is_idempotent() {
        let (_dir, store) = store();
        let table = SourceTables::default().table(TableKind::LeadTime);
        assert!(store.create_table(&table, TableKind::LeadTime).unwrap());
        assert!(!store.create_table(&table, TableKind::LeadTime).unwrap());
        let meta = store.describe(&table).unwrap();
        let names: Vec<&str> = meta.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["branch_id", "category_id", "logdays"]);
    }

    #[test]
    fn history_reads_filter_by_date() {
        let (_dir, store) = store();
        let table = SourceTables::default().table(TableKind::HubHistory);
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let rows: Vec<HubInventoryFact> = [d1, d2, d2]
            .into_iter()
            .map(|date| HubInventoryFact {
                product_id: ProductId::from_u128(1),
                date,
                stock: 10.0,
                reserved: 1.0,
                in_transit: 0.0,
            })
            .collect();
        store.write(&table, &rows).unwrap();
        assert_eq!(store.hub_inventory(&table, d1).unwrap().len(), 1);
        assert_eq!(store.hub_inventory(&table, d2).unwrap().len(), 2);
    }

    #[test]
    fn catalog_lists_schemas_and_tables() {
        let (dir, store) = store();
        store.write(&needs_ref(), &needs_rows(1)).unwrap();
        // Not a valid identifier; must not show up.
        fs::create_dir_all(dir.path().join("Bad-Name")).unwrap();
        let catalog = store.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        let tables = &catalog[&Identifier::parse("logistics").unwrap()];
        assert_eq!(tables[0].as_str(), "needs");
    }
}
