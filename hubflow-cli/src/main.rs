//! HubFlow CLI: store setup, data loading, allocation runs and the API server.
//!
//! Commands:
//! - `migrate`: create the schema and empty tables
//! - `check-config`: validate configuration and print it
//! - `load history|products|volumes`: load CSV files into fact tables
//! - `generate needs|min-shipment|storage-limits|logdays|all`: derive planning tables
//! - `distribute`: run an allocation and print or save the rows
//! - `schemas` / `tables <schema>`: introspect the store
//! - `serve`: run the HTTP API

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

use hubflow_core::data::ParquetStore;
use hubflow_core::domain::{AllocationRow, BranchId, CategoryId, ProductId};
use hubflow_core::query::{Identifier, SourceTables};
use hubflow_core::MinimumShipmentPolicy;
use hubflow_runner::etl::{self, HistoryOptions, LoadReport};
use hubflow_runner::export::{rows_to_csv, rows_to_json, write_file};
use hubflow_runner::{
    introspect, logging, migrate, run_allocation, serve, ApiState, AppConfig, DistributionParams,
    StorePool,
};

#[derive(Parser)]
#[command(name = "hubflow", about = "HubFlow: hub-to-branch stock allocation")]
struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG still wins).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema and any missing tables.
    Migrate,
    /// Validate the configuration and print it.
    CheckConfig,
    /// Load CSV files into fact tables.
    Load {
        #[command(subcommand)]
        what: LoadTarget,
    },
    /// Generate planning tables from the loaded history.
    Generate {
        #[command(subcommand)]
        what: GenerateTarget,

        /// RNG seed. Defaults to a random seed.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run an allocation.
    Distribute(DistributeArgs),
    /// List allow-listed schemas present in the store.
    Schemas,
    /// Describe the tables of a schema.
    Tables {
        schema: String,
    },
    /// Serve the HTTP API.
    Serve {
        /// Host to bind. Overrides the configured api_bind host.
        #[arg(long)]
        host: Option<String>,

        /// Port to bind. Overrides the configured api_bind port.
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum LoadTarget {
    /// Branch and hub stock history from branch_products.csv and rc_products.csv.
    History {
        /// Directory containing the two CSV files.
        #[arg(long, default_value = "data")]
        csv_dir: PathBuf,

        /// Daily snapshots to write, ending today.
        #[arg(long, default_value_t = 10)]
        days_back: u32,

        #[arg(long, default_value_t = 500)]
        max_branch_rows: usize,

        #[arg(long, default_value_t = 300)]
        max_hub_rows: usize,

        /// RNG seed for the perturbation. Defaults to a random seed.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Product categories from a product_id,category_id CSV.
    Products {
        #[arg(default_value = "data/products.csv")]
        csv: PathBuf,
    },
    /// Unit volumes from a product_id,volume_per_unit CSV.
    Volumes {
        #[arg(default_value = "data/products_vol.csv")]
        csv: PathBuf,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum GenerateTarget {
    Needs,
    MinShipment,
    StorageLimits,
    Logdays,
    /// All four, in dependency order.
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Args)]
struct DistributeArgs {
    /// Run date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    run_date: Option<NaiveDate>,

    #[arg(long)]
    branch_id: Option<BranchId>,

    #[arg(long)]
    product_id: Option<ProductId>,

    #[arg(long)]
    category_id: Option<CategoryId>,

    /// Keep rows whose lead-time adjusted demand is at least this.
    #[arg(long)]
    min_demand: Option<f64>,

    /// Maximum rows. 0 means unbounded.
    #[arg(long)]
    limit: Option<usize>,

    /// Drop rows that would not fit the branch's free storage volume.
    #[arg(long, default_value_t = false)]
    respect_volume: bool,

    /// clamp (raise demand to the minimum) or filter (drop rows below it).
    #[arg(long)]
    minimum_policy: Option<MinimumShipmentPolicy>,

    #[arg(long)]
    schema: Option<String>,
    #[arg(long)]
    rc_table: Option<String>,
    #[arg(long)]
    branch_table: Option<String>,
    #[arg(long)]
    needs_table: Option<String>,
    #[arg(long)]
    min_table: Option<String>,
    #[arg(long)]
    volume_table: Option<String>,
    #[arg(long)]
    limit_table: Option<String>,
    #[arg(long)]
    product_table: Option<String>,
    #[arg(long)]
    logdays_table: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Write to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

impl From<DistributeArgs> for DistributionParams {
    fn from(a: DistributeArgs) -> Self {
        DistributionParams {
            run_date: a.run_date,
            branch_id: a.branch_id,
            product_id: a.product_id,
            category_id: a.category_id,
            min_demand: a.min_demand,
            limit: a.limit,
            respect_volume: a.respect_volume,
            minimum_policy: a.minimum_policy,
            schema: a.schema,
            rc_table: a.rc_table,
            branch_table: a.branch_table,
            needs_table: a.needs_table,
            min_table: a.min_table,
            volume_table: a.volume_table,
            limit_table: a.limit_table,
            product_table: a.product_table,
            logdays_table: a.logdays_table,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("invalid configuration")?;
    logging::init(cli.verbose, config.production);

    match cli.command {
        Commands::Migrate => run_migrate(&config),
        Commands::CheckConfig => run_check_config(&config),
        Commands::Load { what } => run_load(&config, what),
        Commands::Generate { what, seed } => run_generate(&config, what, seed),
        Commands::Distribute(args) => run_distribute(&config, args),
        Commands::Schemas => run_schemas(&config),
        Commands::Tables { schema } => run_tables(&config, &schema),
        Commands::Serve { host, port } => run_serve(&config, host, port),
    }
}

fn open_store(config: &AppConfig) -> Result<ParquetStore> {
    Ok(ParquetStore::new(config.store_root()?))
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

fn print_reports(reports: &[LoadReport]) {
    for r in reports {
        println!("{:<40} {:>10} rows", r.table, r.rows);
    }
}

fn run_migrate(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let report = migrate(&store)?;
    for name in &report.applied {
        println!("applied  {name}");
    }
    for name in &report.skipped {
        println!("skipped  {name}");
    }
    Ok(())
}

fn run_check_config(config: &AppConfig) -> Result<()> {
    println!("store_url:  {}", config.store_url);
    println!("store_root: {}", config.store_root()?.display());
    println!("production: {}", config.production);
    println!("pool_size:  {}", config.pool_size);
    let schemas: Vec<&str> = config.schemas.iter().map(Identifier::as_str).collect();
    println!("schemas:    {}", schemas.join(", "));
    println!("api_bind:   {}", config.api_bind);
    println!("Configuration OK");
    Ok(())
}

fn run_load(config: &AppConfig, what: LoadTarget) -> Result<()> {
    let store = open_store(config)?;
    let tables = SourceTables::default();
    let reports = match what {
        LoadTarget::History {
            csv_dir,
            days_back,
            max_branch_rows,
            max_hub_rows,
            seed,
        } => {
            let options = HistoryOptions {
                days_back,
                max_branch_rows,
                max_hub_rows,
            };
            let today = chrono::Local::now().date_naive();
            etl::load_history(&store, &tables, &csv_dir, &options, today, &mut rng_from(seed))?
        }
        LoadTarget::Products { csv } => vec![etl::load_products(&store, &tables, &csv)?],
        LoadTarget::Volumes { csv } => vec![etl::load_product_volumes(&store, &tables, &csv)?],
    };
    print_reports(&reports);
    Ok(())
}

fn run_generate(config: &AppConfig, what: GenerateTarget, seed: Option<u64>) -> Result<()> {
    let store = open_store(config)?;
    let tables = SourceTables::default();
    let mut rng = rng_from(seed);
    let reports = match what {
        GenerateTarget::Needs => vec![etl::generate_needs(&store, &tables, &mut rng)?],
        GenerateTarget::MinShipment => vec![etl::generate_min_shipment(&store, &tables, &mut rng)?],
        GenerateTarget::StorageLimits => {
            vec![etl::generate_storage_limits(&store, &tables, &mut rng)?]
        }
        GenerateTarget::Logdays => vec![etl::generate_logdays(&store, &tables, &mut rng)?],
        GenerateTarget::All => etl::generate_all(&store, &tables, &mut rng)?,
    };
    print_reports(&reports);
    Ok(())
}

fn run_distribute(config: &AppConfig, args: DistributeArgs) -> Result<()> {
    let format = args.format;
    let output = args.output.clone();
    let request = DistributionParams::from(args).into_request()?;

    let pool = StorePool::new(config.store_root()?, 1)?;
    let run = run_allocation(&pool, request)?;

    let rendered = match format {
        OutputFormat::Table => render_table(&run.rows),
        OutputFormat::Json => rows_to_json(&run.rows)?,
        OutputFormat::Csv => rows_to_csv(&run.rows)?,
    };
    match output {
        Some(path) => {
            write_file(&path, &rendered)?;
            println!("{} rows written to {}", run.rows.len(), path.display());
        }
        None => print!("{rendered}"),
    }
    eprintln!(
        "rows: {}  total qty: {:.2}  fingerprint: {}",
        run.rows.len(),
        run.total_qty(),
        run.fingerprint.short()
    );
    Ok(())
}

fn render_table(rows: &[AllocationRow]) -> String {
    if rows.is_empty() {
        return "No allocations.\n".to_string();
    }
    let mut out = format!(
        "{:<36}  {:<36}  {:>10}  {:>10}  {:>10}\n{}\n",
        "Branch",
        "Product",
        "Demand",
        "Available",
        "Qty",
        "-".repeat(110)
    );
    for r in rows {
        out.push_str(&format!(
            "{:<36}  {:<36}  {:>10.2}  {:>10.2}  {:>10.2}\n",
            r.branch_id, r.product_id, r.demand, r.available, r.qty
        ));
    }
    out
}

fn run_schemas(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let schemas = introspect::list_schemas(&store, &config.schemas)?;
    if schemas.is_empty() {
        println!("No schemas. Run `hubflow migrate` first.");
    }
    for s in schemas {
        println!("{s}");
    }
    Ok(())
}

fn run_tables(config: &AppConfig, schema: &str) -> Result<()> {
    let store = open_store(config)?;
    let schema = Identifier::parse(schema)?;
    let meta = introspect::schema_structure(&store, &config.schemas, &schema)?;
    for table in &meta.tables {
        println!("{}.{}", meta.schema, table.name);
        for field in &table.fields {
            println!("  {:<20} {}", field.name, field.data_type);
        }
    }
    Ok(())
}

/// `host:port`, each part falling back to the configured bind address.
fn bind_addr(configured: &str, host: Option<String>, port: Option<u16>) -> Result<String> {
    let (default_host, default_port) = configured
        .rsplit_once(':')
        .with_context(|| format!("api_bind '{configured}' is not host:port"))?;
    let port = match port {
        Some(p) => p.to_string(),
        None => default_port.to_string(),
    };
    let host = host.unwrap_or_else(|| default_host.to_string());
    if host.is_empty() {
        bail!("empty host in bind address");
    }
    Ok(format!("{host}:{port}"))
}

fn run_serve(config: &AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let addr = bind_addr(&config.api_bind, host, port)?;
    let state = ApiState::from_config(config)?;
    if !state.pool.root().is_dir() {
        tracing::warn!(root = %state.pool.root().display(), "store root does not exist yet");
    }
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(serve(state, &addr))
}
