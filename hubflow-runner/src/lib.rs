//! HubFlow Runner: everything around the allocation engine.
//!
//! This crate builds on `hubflow-core` to provide:
//! - Process configuration and logging setup
//! - A bounded pool of store handles
//! - Allocation runs with fingerprints
//! - Schema introspection and store migrations
//! - CSV loading and synthetic fact generation
//! - CSV/JSON export and the HTTP API

pub mod api;
pub mod config;
pub mod etl;
pub mod export;
pub mod introspect;
pub mod logging;
pub mod migrate;
pub mod pool;
pub mod runner;

pub use api::{router, serve, ApiError, ApiState, DistributionParams};
pub use config::{str2bool, AppConfig, ConfigError};
pub use etl::{BulkWriter, EtlError, HistoryOptions, LoadReport, BATCH_SIZE};
pub use migrate::{migrate, MigrateError, MigrationReport};
pub use pool::{PoolError, PooledStore, StorePool};
pub use runner::{run_allocation, AllocationRun, RunError};
