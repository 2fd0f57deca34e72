//! Brick Ledger - LEGO Collection Tracker
//!
//! Thin CLI over the library: set/barcode resolution, price sync, and
//! valuation reports. All output is JSON on stdout.

use brick_ledger::barcode::{self, UpcLookupClient};
use brick_ledger::config::{BricklinkConfig, RebrickableConfig, UpcLookupConfig};
use brick_ledger::rebrickable::{self, RebrickableClient};
use brick_ledger::{database, reports, sync, BricklinkClient, Error, SyncOptions};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;

/// LEGO collection tracker - resolves sets, syncs prices, reports value
#[derive(Parser, Debug)]
#[command(name = "brick_ledger")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value_t = default_db_path())]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a set number to its catalog record
    Resolve {
        /// Set number, with or without variant suffix (e.g. 75192 or 75192-1)
        set_num: String,
    },
    /// Resolve a scanned barcode to its catalog record
    Barcode {
        /// EAN/UPC code
        code: String,
    },
    /// Search the catalog by free text
    Search {
        query: String,
    },
    /// Resolve a set and add it to the inventory
    Add {
        set_num: String,
        /// Owning family member id
        #[arg(long)]
        owner_id: Option<i64>,
        #[arg(long, default_value_t = 1)]
        quantity: i64,
        #[arg(long)]
        purchase_price: Option<f64>,
        /// Acquisition date (YYYY-MM-DD)
        #[arg(long)]
        date_acquired: Option<String>,
    },
    /// Show the latest snapshot and recent price history for a set
    Prices {
        set_num: String,
        /// History window in days
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
    /// Fetch today's price snapshots from BrickLink
    Sync {
        /// Sets to update; defaults to every set in inventory
        set_nums: Vec<String>,
        /// Pause between sets in milliseconds
        #[arg(long, default_value_t = sync::DEFAULT_DELAY_MS)]
        delay_ms: u64,
    },
    /// Valuation and trend reports
    Report {
        #[command(subcommand)]
        report: ReportCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    /// Collection totals and ROI
    Summary,
    /// Value grouped by family member
    Members,
    /// Value grouped by theme
    Themes,
    /// Most valuable entries
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Biggest price movers in a trailing window
    Movers {
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Collection value over time
    Trend {
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
    /// Most recently added entries
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

/// Returns the default database path: ~/.local/share/brick_ledger/ledger.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("brick_ledger")
        .join("ledger.db")
        .to_string_lossy()
        .to_string()
}

fn print_json<T: Serialize>(value: &T) -> brick_ledger::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct ResolveOutput {
    set: database::SetRecord,
    source: brick_ledger::SetOrigin,
}

#[derive(Serialize)]
struct AddOutput {
    id: i64,
    set: database::SetRecord,
    quantity: i64,
}

#[derive(Serialize)]
struct PricesOutput {
    latest: database::PriceRow,
    history: Vec<database::PriceRow>,
}

async fn run(args: Args) -> brick_ledger::Result<()> {
    let db_path = PathBuf::from(&args.database);
    if let Some(parent) = db_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create {}: {}", parent.display(), e)))?;
            log::info!("Created directory: {}", parent.display());
        }
    }

    let conn = Connection::open(&db_path)?;
    log::info!("Opened database: {}", db_path.display());
    database::init_schema(&conn)?;

    match args.command {
        Command::Resolve { set_num } => {
            let client = RebrickableClient::new(RebrickableConfig::from_env());
            let (set, source) = rebrickable::resolve_set(&conn, &client, &set_num).await?;
            print_json(&ResolveOutput { set, source })
        }
        Command::Barcode { code } => {
            let catalog = RebrickableClient::new(RebrickableConfig::from_env());
            let lookup = UpcLookupClient::new(UpcLookupConfig::default());
            let resolution = barcode::resolve_barcode(&conn, &catalog, &lookup, &code).await?;
            print_json(&resolution)
        }
        Command::Search { query } => {
            let client = RebrickableClient::new(RebrickableConfig::from_env());
            let results = client.search_sets(&query).await?;
            print_json(&results)
        }
        Command::Add {
            set_num,
            owner_id,
            quantity,
            purchase_price,
            date_acquired,
        } => {
            let client = RebrickableClient::new(RebrickableConfig::from_env());
            let (set, _) = rebrickable::resolve_set(&conn, &client, &set_num).await?;
            let id = database::insert_inventory_entry(
                &conn,
                &set.set_num,
                owner_id,
                quantity,
                purchase_price,
                date_acquired.as_deref(),
            )?;
            log::info!("Added {} x{} to inventory", set.set_num, quantity);
            print_json(&AddOutput { id, set, quantity })
        }
        Command::Prices { set_num, days } => {
            let set_num = set_num.trim();
            let latest = database::latest_price(&conn, set_num)?
                .ok_or_else(|| Error::NotFound(format!("No price data found for {}", set_num)))?;
            let history = database::price_history_window(&conn, set_num, days)?;
            print_json(&PricesOutput { latest, history })
        }
        Command::Sync { set_nums, delay_ms } => {
            // Credentials are validated here, before any set is processed
            let client = BricklinkClient::new(BricklinkConfig::from_env()?);
            let options = SyncOptions {
                set_nums: (!set_nums.is_empty()).then_some(set_nums),
                delay_ms,
            };
            let summary = sync::run_price_update(&conn, &client, &options).await?;
            print_json(&summary)
        }
        Command::Report { report } => match report {
            ReportCommand::Summary => print_json(&reports::summary(&conn)?),
            ReportCommand::Members => print_json(&reports::value_by_member(&conn)?),
            ReportCommand::Themes => print_json(&reports::value_by_theme(&conn)?),
            ReportCommand::Top { limit } => print_json(&reports::top_sets(&conn, limit)?),
            ReportCommand::Movers { days, limit } => {
                print_json(&reports::movers(&conn, days, limit)?)
            }
            ReportCommand::Trend { days } => print_json(&reports::trend(&conn, days)?),
            ReportCommand::Recent { limit } => print_json(&reports::recent(&conn, limit)?),
        },
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
