//! Row ↔ DataFrame conversion for every fact table.
//!
//! Column layout per table:
//!
//! | table | columns |
//! |---|---|
//! | hub history | product_id, date, stock, reserved, in_transit |
//! | branch history | branch_id, product_id, date, stock, reserved, in_transit |
//! | needs | branch_id, product_id, needs |
//! | min_shipment | branch_id, product_id, min_qty |
//! | logdays | branch_id, category_id, logdays |
//! | products | product_id, category_id |
//! | storage_limits | branch_id, max_volume |
//! | products_vol | product_id, volume_per_unit |
//!
//! UUIDs are stored as strings, dates as Parquet `Date` (days since epoch),
//! quantities as `f64`, logdays as `i32`. Every column is NOT NULL; a null
//! on read is a malformed row.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use uuid::Uuid;

use super::source::StoreError;
use crate::domain::{
    BranchId, BranchInventoryFact, BranchStorageLimit, CategoryId, DemandRequirement,
    HubInventoryFact, LeadTimeProfile, MinimumShipment, ProductCategory, ProductId,
    ProductVolume, ALLOWED_LOGDAYS,
};
use crate::query::TableKind;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A struct that maps one-to-one onto a fact table.
pub trait FactRecord: Sized {
    const KIND: TableKind;
    const COLUMNS: &'static [&'static str];

    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError>;

    /// `table` is only used for error messages.
    fn from_frame(df: &DataFrame, table: &str) -> Result<Vec<Self>, StoreError>;
}

/// Column names of a logical table, in storage order.
pub fn columns(kind: TableKind) -> &'static [&'static str] {
    match kind {
        TableKind::HubHistory => HubInventoryFact::COLUMNS,
        TableKind::BranchHistory => BranchInventoryFact::COLUMNS,
        TableKind::Needs => DemandRequirement::COLUMNS,
        TableKind::MinShipment => MinimumShipment::COLUMNS,
        TableKind::ProductVolume => ProductVolume::COLUMNS,
        TableKind::StorageLimit => BranchStorageLimit::COLUMNS,
        TableKind::Product => ProductCategory::COLUMNS,
        TableKind::LeadTime => LeadTimeProfile::COLUMNS,
    }
}

/// A zero-row frame with the right column types for `kind`.
pub fn empty_frame(kind: TableKind) -> Result<DataFrame, StoreError> {
    match kind {
        TableKind::HubHistory => HubInventoryFact::to_frame(&[]),
        TableKind::BranchHistory => BranchInventoryFact::to_frame(&[]),
        TableKind::Needs => DemandRequirement::to_frame(&[]),
        TableKind::MinShipment => MinimumShipment::to_frame(&[]),
        TableKind::ProductVolume => ProductVolume::to_frame(&[]),
        TableKind::StorageLimit => BranchStorageLimit::to_frame(&[]),
        TableKind::Product => ProductCategory::to_frame(&[]),
        TableKind::LeadTime => LeadTimeProfile::to_frame(&[]),
    }
}

// ── Column builders ─────────────────────────────────────────────────

fn parquet_err(context: &str) -> impl Fn(PolarsError) -> StoreError + '_ {
    move |e| StoreError::Parquet(format!("{context}: {e}"))
}

fn uuid_column(name: &str, ids: impl Iterator<Item = Uuid>) -> Column {
    let values: Vec<String> = ids.map(|id| id.to_string()).collect();
    Column::new(name.into(), values)
}

fn date_column(name: &str, dates: impl Iterator<Item = NaiveDate>) -> Result<Column, StoreError> {
    let days: Vec<i32> = dates
        .map(|d| d.num_days_from_ce() - EPOCH_DAYS_FROM_CE)
        .collect();
    Column::new(name.into(), days)
        .cast(&DataType::Date)
        .map_err(parquet_err("date cast"))
}

fn float_column(name: &str, values: impl Iterator<Item = f64>) -> Column {
    Column::new(name.into(), values.collect::<Vec<f64>>())
}

fn frame(columns: Vec<Column>) -> Result<DataFrame, StoreError> {
    DataFrame::new(columns).map_err(parquet_err("dataframe creation"))
}

// ── Column readers ──────────────────────────────────────────────────

struct FrameReader<'a> {
    df: &'a DataFrame,
    table: &'a str,
}

impl<'a> FrameReader<'a> {
    fn new(df: &'a DataFrame, table: &'a str, expected: &[&str]) -> Result<Self, StoreError> {
        for name in expected {
            if df.column(name).is_err() {
                return Err(StoreError::MissingColumn {
                    table: table.to_string(),
                    column: name.to_string(),
                });
            }
        }
        Ok(Self { df, table })
    }

    fn column(&self, name: &str) -> Result<&Column, StoreError> {
        self.df.column(name).map_err(|_| StoreError::MissingColumn {
            table: self.table.to_string(),
            column: name.to_string(),
        })
    }

    fn malformed(&self, row: usize, reason: String) -> StoreError {
        StoreError::MalformedRow {
            table: self.table.to_string(),
            row,
            reason,
        }
    }

    fn uuids(&self, name: &str) -> Result<Vec<Uuid>, StoreError> {
        let col = self.column(name)?;
        let ca = col
            .str()
            .map_err(|e| StoreError::Parquet(format!("{name} column type: {e}")))?;
        ca.into_iter()
            .enumerate()
            .map(|(i, v)| {
                let raw = v.ok_or_else(|| self.malformed(i, format!("null {name}")))?;
                Uuid::parse_str(raw.trim())
                    .map_err(|e| self.malformed(i, format!("bad uuid in {name}: {e}")))
            })
            .collect()
    }

    fn floats(&self, name: &str) -> Result<Vec<f64>, StoreError> {
        let col = self
            .column(name)?
            .cast(&DataType::Float64)
            .map_err(|e| StoreError::Parquet(format!("{name} column type: {e}")))?;
        let ca = col
            .f64()
            .map_err(|e| StoreError::Parquet(format!("{name} column type: {e}")))?;
        ca.into_iter()
            .enumerate()
            .map(|(i, v)| v.ok_or_else(|| self.malformed(i, format!("null {name}"))))
            .collect()
    }

    fn ints(&self, name: &str) -> Result<Vec<i32>, StoreError> {
        let col = self
            .column(name)?
            .cast(&DataType::Int32)
            .map_err(|e| StoreError::Parquet(format!("{name} column type: {e}")))?;
        let ca = col
            .i32()
            .map_err(|e| StoreError::Parquet(format!("{name} column type: {e}")))?;
        ca.into_iter()
            .enumerate()
            .map(|(i, v)| v.ok_or_else(|| self.malformed(i, format!("null {name}"))))
            .collect()
    }

    fn dates(&self, name: &str) -> Result<Vec<NaiveDate>, StoreError> {
        self.ints(name)?
            .into_iter()
            .enumerate()
            .map(|(i, days)| {
                NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE)
                    .ok_or_else(|| self.malformed(i, format!("{name} out of range: {days}")))
            })
            .collect()
    }
}

// ── Records ─────────────────────────────────────────────────────────

impl FactRecord for HubInventoryFact {
    const KIND: TableKind = TableKind::HubHistory;
    const COLUMNS: &'static [&'static str] =
        &["product_id", "date", "stock", "reserved", "in_transit"];

    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        frame(vec![
            uuid_column("product_id", rows.iter().map(|r| r.product_id.0)),
            date_column("date", rows.iter().map(|r| r.date))?,
            float_column("stock", rows.iter().map(|r| r.stock)),
            float_column("reserved", rows.iter().map(|r| r.reserved)),
            float_column("in_transit", rows.iter().map(|r| r.in_transit)),
        ])
    }

    fn from_frame(df: &DataFrame, table: &str) -> Result<Vec<Self>, StoreError> {
        let r = FrameReader::new(df, table, Self::COLUMNS)?;
        let products = r.uuids("product_id")?;
        let dates = r.dates("date")?;
        let stock = r.floats("stock")?;
        let reserved = r.floats("reserved")?;
        let in_transit = r.floats("in_transit")?;

        Ok((0..df.height())
            .map(|i| HubInventoryFact {
                product_id: ProductId(products[i]),
                date: dates[i],
                stock: stock[i],
                reserved: reserved[i],
                in_transit: in_transit[i],
            })
            .collect())
    }
}

impl FactRecord for BranchInventoryFact {
    const KIND: TableKind = TableKind::BranchHistory;
    const COLUMNS: &'static [&'static str] = &[
        "branch_id",
        "product_id",
        "date",
        "stock",
        "reserved",
        "in_transit",
    ];

    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        frame(vec![
            uuid_column("branch_id", rows.iter().map(|r| r.branch_id.0)),
            uuid_column("product_id", rows.iter().map(|r| r.product_id.0)),
            date_column("date", rows.iter().map(|r| r.date))?,
            float_column("stock", rows.iter().map(|r| r.stock)),
            float_column("reserved", rows.iter().map(|r| r.reserved)),
            float_column("in_transit", rows.iter().map(|r| r.in_transit)),
        ])
    }

    fn from_frame(df: &DataFrame, table: &str) -> Result<Vec<Self>, StoreError> {
        let r = FrameReader::new(df, table, Self::COLUMNS)?;
        let branches = r.uuids("branch_id")?;
        let products = r.uuids("product_id")?;
        let dates = r.dates("date")?;
        let stock = r.floats("stock")?;
        let reserved = r.floats("reserved")?;
        let in_transit = r.floats("in_transit")?;

        Ok((0..df.height())
            .map(|i| BranchInventoryFact {
                branch_id: BranchId(branches[i]),
                product_id: ProductId(products[i]),
                date: dates[i],
                stock: stock[i],
                reserved: reserved[i],
                in_transit: in_transit[i],
            })
            .collect())
    }
}

impl FactRecord for DemandRequirement {
    const KIND: TableKind = TableKind::Needs;
    const COLUMNS: &'static [&'static str] = &["branch_id", "product_id", "needs"];

    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        frame(vec![
            uuid_column("branch_id", rows.iter().map(|r| r.branch_id.0)),
            uuid_column("product_id", rows.iter().map(|r| r.product_id.0)),
            float_column("needs", rows.iter().map(|r| r.needs)),
        ])
    }

    fn from_frame(df: &DataFrame, table: &str) -> Result<Vec<Self>, StoreError> {
        let r = FrameReader::new(df, table, Self::COLUMNS)?;
        let branches = r.uuids("branch_id")?;
        let products = r.uuids("product_id")?;
        let needs = r.floats("needs")?;

        Ok((0..df.height())
            .map(|i| DemandRequirement {
                branch_id: BranchId(branches[i]),
                product_id: ProductId(products[i]),
                needs: needs[i],
            })
            .collect())
    }
}

impl FactRecord for MinimumShipment {
    const KIND: TableKind = TableKind::MinShipment;
    const COLUMNS: &'static [&'static str] = &["branch_id", "product_id", "min_qty"];

    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        frame(vec![
            uuid_column("branch_id", rows.iter().map(|r| r.branch_id.0)),
            uuid_column("product_id", rows.iter().map(|r| r.product_id.0)),
            float_column("min_qty", rows.iter().map(|r| r.min_qty)),
        ])
    }

    fn from_frame(df: &DataFrame, table: &str) -> Result<Vec<Self>, StoreError> {
        let r = FrameReader::new(df, table, Self::COLUMNS)?;
        let branches = r.uuids("branch_id")?;
        let products = r.uuids("product_id")?;
        let min_qty = r.floats("min_qty")?;

        Ok((0..df.height())
            .map(|i| MinimumShipment {
                branch_id: BranchId(branches[i]),
                product_id: ProductId(products[i]),
                min_qty: min_qty[i],
            })
            .collect())
    }
}

impl FactRecord for LeadTimeProfile {
    const KIND: TableKind = TableKind::LeadTime;
    const COLUMNS: &'static [&'static str] = &["branch_id", "category_id", "logdays"];

    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        if let Some(bad) = rows.iter().find(|r| !r.is_valid()) {
            return Err(StoreError::Constraint {
                table: "logdays".into(),
                reason: format!("logdays {} not in {ALLOWED_LOGDAYS:?}", bad.logdays),
            });
        }
        let logdays: Vec<i32> = rows.iter().map(|r| r.logdays as i32).collect();
        frame(vec![
            uuid_column("branch_id", rows.iter().map(|r| r.branch_id.0)),
            uuid_column("category_id", rows.iter().map(|r| r.category_id.0)),
            Column::new("logdays".into(), logdays),
        ])
    }

    fn from_frame(df: &DataFrame, table: &str) -> Result<Vec<Self>, StoreError> {
        let r = FrameReader::new(df, table, Self::COLUMNS)?;
        let branches = r.uuids("branch_id")?;
        let categories = r.uuids("category_id")?;
        let logdays = r.ints("logdays")?;

        let mut out = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let days = logdays[i];
            let profile = LeadTimeProfile {
                branch_id: BranchId(branches[i]),
                category_id: CategoryId(categories[i]),
                logdays: u32::try_from(days).unwrap_or(0),
            };
            if !profile.is_valid() {
                return Err(StoreError::Constraint {
                    table: table.to_string(),
                    reason: format!("row {i}: logdays {days} not in {ALLOWED_LOGDAYS:?}"),
                });
            }
            out.push(profile);
        }
        Ok(out)
    }
}

impl FactRecord for ProductCategory {
    const KIND: TableKind = TableKind::Product;
    const COLUMNS: &'static [&'static str] = &["product_id", "category_id"];

    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        frame(vec![
            uuid_column("product_id", rows.iter().map(|r| r.product_id.0)),
            uuid_column("category_id", rows.iter().map(|r| r.category_id.0)),
        ])
    }

    fn from_frame(df: &DataFrame, table: &str) -> Result<Vec<Self>, StoreError> {
        let r = FrameReader::new(df, table, Self::COLUMNS)?;
        let products = r.uuids("product_id")?;
        let categories = r.uuids("category_id")?;

        Ok(products
            .into_iter()
            .zip(categories)
            .map(|(p, c)| ProductCategory {
                product_id: ProductId(p),
                category_id: CategoryId(c),
            })
            .collect())
    }
}

impl FactRecord for BranchStorageLimit {
    const KIND: TableKind = TableKind::StorageLimit;
    const COLUMNS: &'static [&'static str] = &["branch_id", "max_volume"];

    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        frame(vec![
            uuid_column("branch_id", rows.iter().map(|r| r.branch_id.0)),
            float_column("max_volume", rows.iter().map(|r| r.max_volume)),
        ])
    }

    fn from_frame(df: &DataFrame, table: &str) -> Result<Vec<Self>, StoreError> {
        let r = FrameReader::new(df, table, Self::COLUMNS)?;
        let branches = r.uuids("branch_id")?;
        let volumes = r.floats("max_volume")?;

        Ok(branches
            .into_iter()
            .zip(volumes)
            .map(|(b, v)| BranchStorageLimit {
                branch_id: BranchId(b),
                max_volume: v,
            })
            .collect())
    }
}

impl FactRecord for ProductVolume {
    const KIND: TableKind = TableKind::ProductVolume;
    const COLUMNS: &'static [&'static str] = &["product_id", "volume_per_unit"];

    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        frame(vec![
            uuid_column("product_id", rows.iter().map(|r| r.product_id.0)),
            float_column("volume_per_unit", rows.iter().map(|r| r.volume_per_unit)),
        ])
    }

    fn from_frame(df: &DataFrame, table: &str) -> Result<Vec<Self>, StoreError> {
        let r = FrameReader::new(df, table, Self::COLUMNS)?;
        let products = r.uuids("product_id")?;
        let volumes = r.floats("volume_per_unit")?;

        Ok(products
            .into_iter()
            .zip(volumes)
            .map(|(p, v)| ProductVolume {
                product_id: ProductId(p),
                volume_per_unit: v,
            })
            .collect())
    }
}
