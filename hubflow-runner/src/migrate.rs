//! Ordered store migrations.
//!
//! Each migration creates the schema directory or one or more empty tables.
//! Applied migration names are recorded in `migration_log.json` at the store
//! root and skipped on the next run. Creating a table that already exists is
//! a no-op, so re-running against a hand-built store is safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use hubflow_core::data::{ParquetStore, StoreError};
use hubflow_core::query::{SourceTables, TableKind};

pub const MIGRATION_LOG: &str = "migration_log.json";

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("migration log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt migration log: {0}")]
    Log(#[from] serde_json::Error),
}

/// What a migration does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateSchema,
    CreateTables(&'static [TableKind]),
}

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub step: Step,
}

/// All migrations, in the order they apply.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_create_schema",
        step: Step::CreateSchema,
    },
    Migration {
        name: "002_create_branch_product_history",
        step: Step::CreateTables(&[TableKind::BranchHistory]),
    },
    Migration {
        name: "003_create_rc_product_history",
        step: Step::CreateTables(&[TableKind::HubHistory]),
    },
    Migration {
        name: "004_create_needs",
        step: Step::CreateTables(&[TableKind::Needs]),
    },
    Migration {
        name: "005_create_logdays",
        step: Step::CreateTables(&[TableKind::LeadTime]),
    },
    Migration {
        name: "006_create_min_shipment",
        step: Step::CreateTables(&[TableKind::MinShipment]),
    },
    Migration {
        name: "007_create_storage_limits",
        step: Step::CreateTables(&[TableKind::StorageLimit]),
    },
    Migration {
        name: "008_create_products_vol",
        step: Step::CreateTables(&[TableKind::Product, TableKind::ProductVolume]),
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Contents of `migration_log.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationLog {
    pub applied: Vec<AppliedMigration>,
}

impl MigrationLog {
    fn path(root: &Path) -> PathBuf {
        root.join(MIGRATION_LOG)
    }

    /// Load the log, or an empty one if the store has never been migrated.
    pub fn load(root: &Path) -> Result<Self, MigrateError> {
        let path = Self::path(root);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(MigrateError::Io { path, source }),
        }
    }

    fn save(&self, root: &Path) -> Result<(), MigrateError> {
        let path = Self::path(root);
        let tmp = path.with_extension("json.tmp");
        let io = |source| MigrateError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(root).map_err(io)?;
        fs::write(&tmp, serde_json::to_vec_pretty(self)?).map_err(io)?;
        fs::rename(&tmp, &path).map_err(io)?;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.applied.iter().any(|m| m.name == name)
    }
}

/// Outcome of one `migrate` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
}

fn apply(store: &ParquetStore, tables: &SourceTables, step: Step) -> Result<(), StoreError> {
    match step {
        Step::CreateSchema => store.create_schema(&tables.schema),
        Step::CreateTables(kinds) => {
            for &kind in kinds {
                let table = tables.table(kind);
                if store.create_table(&table, kind)? {
                    tracing::debug!(table = %table, "table created");
                }
            }
            Ok(())
        }
    }
}

/// Apply every pending migration in order, logging each one as it lands.
pub fn migrate(store: &ParquetStore) -> Result<MigrationReport, MigrateError> {
    let tables = SourceTables::default();
    let mut log = MigrationLog::load(store.root())?;
    let mut report = MigrationReport::default();

    for migration in MIGRATIONS {
        if log.contains(migration.name) {
            tracing::debug!(migration = migration.name, "already applied");
            report.skipped.push(migration.name);
            continue;
        }
        tracing::info!(migration = migration.name, "applying migration");
        apply(store, &tables, migration.step)?;
        log.applied.push(AppliedMigration {
            name: migration.name.to_string(),
            applied_at: Utc::now(),
        });
        log.save(store.root())?;
        report.applied.push(migration.name);
    }

    tracing::info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "migrations complete"
    );
    Ok(report)
}
