//! Bulk loading and synthetic fact generation.
//!
//! Loaders read CSV files into fact tables. Generators derive the planning
//! tables (needs, minimum shipments, storage limits, lead times) from the
//! loaded history using a caller-supplied RNG, so a fixed seed gives a
//! reproducible store.
//!
//! Every write goes through [`BulkWriter`], which streams rows into the
//! table in `BATCH_SIZE` chunks and swaps the table in atomically at the
//! end. A load replaces the whole table: truncate-then-load, never append.

use chrono::{Duration, NaiveDate};
use encoding_rs::Encoding;
use encoding_rs_io::DecodeReaderBytesBuilder;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use hubflow_core::data::{FactRecord, ParquetStore, StoreError, TableWriter};
use hubflow_core::domain::{
    BranchId, BranchInventoryFact, BranchStorageLimit, CategoryId, DemandRequirement,
    HubInventoryFact, LeadTimeProfile, MinimumShipment, ProductCategory, ProductId,
    ProductVolume, ALLOWED_LOGDAYS,
};
use hubflow_core::query::{SourceTables, TableKind, TableRef};

/// Rows per write chunk.
pub const BATCH_SIZE: usize = 5000;

pub const BRANCH_HISTORY_CSV: &str = "branch_products.csv";
pub const HUB_HISTORY_CSV: &str = "rc_products.csv";

#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

// ── Bulk writer ──────────────────────────────────────────────────────

/// Buffered, chunked replacement of one table.
pub struct BulkWriter<R: FactRecord> {
    writer: TableWriter,
    table: TableRef,
    buffer: Vec<R>,
    batch_size: usize,
    flushed: usize,
}

impl<R: FactRecord> BulkWriter<R> {
    pub fn open(store: &ParquetStore, table: &TableRef) -> Result<Self, StoreError> {
        Ok(Self {
            writer: store.replace::<R>(table)?,
            table: table.clone(),
            buffer: Vec::with_capacity(BATCH_SIZE),
            batch_size: BATCH_SIZE,
            flushed: 0,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn push(&mut self, row: R) -> Result<(), StoreError> {
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = R>) -> Result<(), StoreError> {
        for row in rows {
            self.push(row)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.writer.write(&self.buffer)?;
        tracing::info!(
            table = %self.table,
            start = self.flushed,
            size = self.buffer.len(),
            "inserted batch"
        );
        self.flushed += self.buffer.len();
        self.buffer.clear();
        Ok(())
    }

    /// Write what is left and replace the table. Returns the total row count.
    pub fn finish(mut self) -> Result<usize, StoreError> {
        self.flush()?;
        let total = self.writer.commit()?;
        tracing::info!(table = %self.table, total, "table replaced");
        Ok(total)
    }
}

/// Replace `table` with `rows`.
pub fn bulk_write<R: FactRecord>(
    store: &ParquetStore,
    table: &TableRef,
    rows: impl IntoIterator<Item = R>,
) -> Result<usize, StoreError> {
    let mut writer = BulkWriter::open(store, table)?;
    writer.extend(rows)?;
    writer.finish()
}

// ── CSV input ────────────────────────────────────────────────────────
//
// Exports from the accounting system arrive in Windows-1251 with Russian
// headers; hand-made files are UTF-8 with snake_case headers. Both load.

#[derive(Debug, Clone, Deserialize)]
struct BranchStockRow {
    #[serde(alias = "Фирма")]
    branch_id: BranchId,
    #[serde(alias = "Товар")]
    product_id: ProductId,
    #[serde(alias = "Остаток")]
    stock: f64,
    #[serde(alias = "Резерв")]
    reserved: f64,
    #[serde(alias = "Транзит")]
    in_transit: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct HubStockRow {
    #[serde(alias = "Товар")]
    product_id: ProductId,
    #[serde(alias = "Остаток")]
    stock: f64,
    #[serde(alias = "Резерв")]
    reserved: f64,
    #[serde(alias = "Транзит")]
    in_transit: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ProductRow {
    #[serde(alias = "Product_ID")]
    product_id: ProductId,
    #[serde(alias = "Category_ID")]
    category_id: CategoryId,
}

#[derive(Debug, Clone, Deserialize)]
struct VolumeRow {
    #[serde(alias = "Товар")]
    product_id: ProductId,
    #[serde(alias = "ОбъемЕд")]
    volume_per_unit: f64,
}

/// UTF-8 when the bytes are valid UTF-8 (BOM or not), Windows-1251 otherwise.
fn sniff_encoding(bytes: &[u8]) -> &'static Encoding {
    if std::str::from_utf8(bytes).is_ok() {
        encoding_rs::UTF_8
    } else {
        encoding_rs::WINDOWS_1251
    }
}

/// Read up to `max_rows` records (all of them when `None`).
fn read_csv<T: DeserializeOwned>(path: &Path, max_rows: Option<usize>) -> Result<Vec<T>, EtlError> {
    let csv_err = |source| EtlError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let bytes = std::fs::read(path).map_err(|source| EtlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let encoding = sniff_encoding(&bytes);
    let decoded = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .strip_bom(true)
        .build(bytes.as_slice());
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(decoded);
    let records = reader.deserialize::<T>();
    let rows = match max_rows {
        Some(n) => records.take(n).collect::<Result<Vec<_>, _>>(),
        None => records.collect::<Result<Vec<_>, _>>(),
    };
    let rows = rows.map_err(csv_err)?;
    tracing::debug!(path = %path.display(), encoding = encoding.name(), rows = rows.len(), "csv read");
    Ok(rows)
}

// ── Loaders ──────────────────────────────────────────────────────────

/// How much history to synthesise from the stock snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryOptions {
    /// Daily snapshots to write, ending at the anchor date.
    pub days_back: u32,
    pub max_branch_rows: usize,
    pub max_hub_rows: usize,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            days_back: 10,
            max_branch_rows: 500,
            max_hub_rows: 300,
        }
    }
}

/// Row counts written by one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub table: String,
    pub rows: usize,
}

impl LoadReport {
    fn new(table: &TableRef, rows: usize) -> Self {
        Self {
            table: table.to_string(),
            rows,
        }
    }
}

/// `value` scaled by a uniform factor in `[1 - delta, 1 + delta]`, to 2 dp.
pub fn perturb(value: f64, delta: f64, rng: &mut impl Rng) -> f64 {
    round2(value * (1.0 + rng.gen_range(-delta..=delta)))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Load both history tables from `csv_dir`, one perturbed snapshot per day
/// for the `days_back` days ending at `anchor`.
pub fn load_history(
    store: &ParquetStore,
    tables: &SourceTables,
    csv_dir: &Path,
    options: &HistoryOptions,
    anchor: NaiveDate,
    rng: &mut impl Rng,
) -> Result<Vec<LoadReport>, EtlError> {
    let branch_rows: Vec<BranchStockRow> =
        read_csv(&csv_dir.join(BRANCH_HISTORY_CSV), Some(options.max_branch_rows))?;
    let hub_rows: Vec<HubStockRow> =
        read_csv(&csv_dir.join(HUB_HISTORY_CSV), Some(options.max_hub_rows))?;

    let branch_table = tables.table(TableKind::BranchHistory);
    let hub_table = tables.table(TableKind::HubHistory);
    let mut branch_out = BulkWriter::<BranchInventoryFact>::open(store, &branch_table)?;
    let mut hub_out = BulkWriter::<HubInventoryFact>::open(store, &hub_table)?;

    for offset in 0..options.days_back {
        let date = anchor - Duration::days(i64::from(offset));
        for row in &branch_rows {
            branch_out.push(BranchInventoryFact {
                branch_id: row.branch_id,
                product_id: row.product_id,
                date,
                stock: perturb(row.stock, 0.1, rng),
                reserved: perturb(row.reserved, 0.1, rng),
                in_transit: perturb(row.in_transit, 0.1, rng),
            })?;
        }
        for row in &hub_rows {
            hub_out.push(HubInventoryFact {
                product_id: row.product_id,
                date,
                stock: perturb(row.stock, 0.1, rng),
                reserved: perturb(row.reserved, 0.1, rng),
                in_transit: perturb(row.in_transit, 0.1, rng),
            })?;
        }
        tracing::info!(date = %date, "history rows staged for date");
    }

    Ok(vec![
        LoadReport::new(&branch_table, branch_out.finish()?),
        LoadReport::new(&hub_table, hub_out.finish()?),
    ])
}

/// Load product → category membership (`product_id,category_id`).
pub fn load_products(
    store: &ParquetStore,
    tables: &SourceTables,
    csv_path: &Path,
) -> Result<LoadReport, EtlError> {
    let rows: Vec<ProductRow> = read_csv(csv_path, None)?;
    let table = tables.table(TableKind::Product);
    let written = bulk_write(
        store,
        &table,
        rows.into_iter().map(|r| ProductCategory {
            product_id: r.product_id,
            category_id: r.category_id,
        }),
    )?;
    Ok(LoadReport::new(&table, written))
}

/// Load unit volumes (`product_id,volume_per_unit`).
pub fn load_product_volumes(
    store: &ParquetStore,
    tables: &SourceTables,
    csv_path: &Path,
) -> Result<LoadReport, EtlError> {
    let rows: Vec<VolumeRow> = read_csv(csv_path, None)?;
    let table = tables.table(TableKind::ProductVolume);
    let written = bulk_write(
        store,
        &table,
        rows.into_iter().map(|r| ProductVolume {
            product_id: r.product_id,
            volume_per_unit: r.volume_per_unit,
        }),
    )?;
    Ok(LoadReport::new(&table, written))
}

// ── Generators (pure) ────────────────────────────────────────────────

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// One needs row per (branch, product) in the history: median stock times
/// a uniform factor in `[1.2, 2.0]`, to 2 dp.
pub fn needs_from_history(
    history: &[BranchInventoryFact],
    rng: &mut impl Rng,
) -> Vec<DemandRequirement> {
    let mut stocks: BTreeMap<(BranchId, ProductId), Vec<f64>> = BTreeMap::new();
    for fact in history {
        stocks
            .entry((fact.branch_id, fact.product_id))
            .or_default()
            .push(fact.stock);
    }
    stocks
        .into_iter()
        .map(|((branch_id, product_id), mut values)| DemandRequirement {
            branch_id,
            product_id,
            needs: round2(median(&mut values) * rng.gen_range(1.2..=2.0)),
        })
        .collect()
}

/// One minimum per needs row, an integer in `1..=5`.
pub fn minimums_from_needs(needs: &[DemandRequirement], rng: &mut impl Rng) -> Vec<MinimumShipment> {
    needs
        .iter()
        .map(|n| MinimumShipment {
            branch_id: n.branch_id,
            product_id: n.product_id,
            min_qty: f64::from(rng.gen_range(1u32..=5)),
        })
        .collect()
}

/// One capacity per distinct history branch, an integer in `300..=1000`.
pub fn storage_limits_from_history(
    history: &[BranchInventoryFact],
    rng: &mut impl Rng,
) -> Vec<BranchStorageLimit> {
    let branches: BTreeSet<BranchId> = history.iter().map(|f| f.branch_id).collect();
    branches
        .into_iter()
        .map(|branch_id| BranchStorageLimit {
            branch_id,
            max_volume: f64::from(rng.gen_range(300u32..=1000)),
        })
        .collect()
}

/// One lead time per distinct (branch, category) reachable through the
/// product table. History rows for uncategorised products are skipped.
pub fn lead_times_from_history(
    history: &[BranchInventoryFact],
    products: &[ProductCategory],
    rng: &mut impl Rng,
) -> Vec<LeadTimeProfile> {
    let category_of: BTreeMap<ProductId, CategoryId> = products
        .iter()
        .map(|p| (p.product_id, p.category_id))
        .collect();
    let pairs: BTreeSet<(BranchId, CategoryId)> = history
        .iter()
        .filter_map(|f| category_of.get(&f.product_id).map(|&c| (f.branch_id, c)))
        .collect();
    pairs
        .into_iter()
        .map(|(branch_id, category_id)| LeadTimeProfile {
            branch_id,
            category_id,
            logdays: *ALLOWED_LOGDAYS.choose(rng).unwrap_or(&ALLOWED_LOGDAYS[0]),
        })
        .collect()
}

// ── Generators (store-backed) ────────────────────────────────────────

pub fn generate_needs(
    store: &ParquetStore,
    tables: &SourceTables,
    rng: &mut impl Rng,
) -> Result<LoadReport, EtlError> {
    tracing::info!("generating needs");
    let history: Vec<BranchInventoryFact> = store.read(&tables.table(TableKind::BranchHistory))?;
    let table = tables.table(TableKind::Needs);
    let written = bulk_write(store, &table, needs_from_history(&history, rng))?;
    Ok(LoadReport::new(&table, written))
}

pub fn generate_min_shipment(
    store: &ParquetStore,
    tables: &SourceTables,
    rng: &mut impl Rng,
) -> Result<LoadReport, EtlError> {
    tracing::info!("generating min_shipment");
    let needs: Vec<DemandRequirement> = store.read(&tables.table(TableKind::Needs))?;
    let table = tables.table(TableKind::MinShipment);
    let written = bulk_write(store, &table, minimums_from_needs(&needs, rng))?;
    Ok(LoadReport::new(&table, written))
}

pub fn generate_storage_limits(
    store: &ParquetStore,
    tables: &SourceTables,
    rng: &mut impl Rng,
) -> Result<LoadReport, EtlError> {
    tracing::info!("generating storage_limits");
    let history: Vec<BranchInventoryFact> = store.read(&tables.table(TableKind::BranchHistory))?;
    let table = tables.table(TableKind::StorageLimit);
    let written = bulk_write(store, &table, storage_limits_from_history(&history, rng))?;
    Ok(LoadReport::new(&table, written))
}

pub fn generate_logdays(
    store: &ParquetStore,
    tables: &SourceTables,
    rng: &mut impl Rng,
) -> Result<LoadReport, EtlError> {
    tracing::info!("generating logdays");
    let history: Vec<BranchInventoryFact> = store.read(&tables.table(TableKind::BranchHistory))?;
    let products: Vec<ProductCategory> = store.read(&tables.table(TableKind::Product))?;
    let table = tables.table(TableKind::LeadTime);
    let written = bulk_write(store, &table, lead_times_from_history(&history, &products, rng))?;
    Ok(LoadReport::new(&table, written))
}

/// Every generator, in dependency order.
pub fn generate_all(
    store: &ParquetStore,
    tables: &SourceTables,
    rng: &mut impl Rng,
) -> Result<Vec<LoadReport>, EtlError> {
    Ok(vec![
        generate_needs(store, tables, rng)?,
        generate_min_shipment(store, tables, rng)?,
        generate_storage_limits(store, tables, rng)?,
        generate_logdays(store, tables, rng)?,
    ])
}
