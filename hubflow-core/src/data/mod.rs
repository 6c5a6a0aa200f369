//! Data layer: the fact source trait, the Parquet store, and frame conversion.

pub mod frames;
pub mod source;
pub mod store;

pub use frames::{columns, empty_frame, FactRecord};
pub use source::{FactSource, InMemoryFacts, StoreError};
pub use store::{ParquetStore, TableWriter};
