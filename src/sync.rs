//! Batch price synchronization
//!
//! Walks the target set list sequentially, one BrickLink lookup at a time,
//! with a fixed inter-item delay to stay under the provider's rate limits.
//! One set's failure never aborts the batch: it is recorded in the summary
//! and the loop moves on.

use crate::bricklink::BricklinkClient;
use crate::database;
use crate::error::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::time::Duration;

/// app_config key holding the timestamp of the last completed sync run
pub const LAST_SYNC_KEY: &str = "last_price_update";

/// Default inter-item delay in milliseconds
pub const DEFAULT_DELAY_MS: u64 = 200;

/// One failed set in a sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub set_num: String,
    pub error: String,
}

/// Outcome of a sync run
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    pub updated: usize,
    pub failed: usize,
    pub failures: Vec<SyncFailure>,
}

/// Options for a sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Explicit target sets; when empty/absent, every distinct set in
    /// inventory is synced in ascending order
    pub set_nums: Option<Vec<String>>,
    pub delay_ms: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            set_nums: None,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

async fn sync_one(
    conn: &Connection,
    client: &BricklinkClient,
    set_num: &str,
    date: &str,
) -> Result<()> {
    let snapshot = client.get_price(set_num).await?;
    database::upsert_price_snapshot(conn, set_num, date, &snapshot)?;
    Ok(())
}

/// Fetch and store today's price snapshot for every target set
///
/// Credentials are validated when the `BricklinkClient`'s config is built,
/// before any set is processed. Per-set transport, parse, and store errors
/// are isolated into the summary's failure list. The global last-sync
/// marker is written after the loop regardless of how many sets failed.
pub async fn run_price_update(
    conn: &Connection,
    client: &BricklinkClient,
    options: &SyncOptions,
) -> Result<SyncSummary> {
    let targets = match &options.set_nums {
        Some(set_nums) if !set_nums.is_empty() => set_nums.clone(),
        _ => database::distinct_inventory_sets(conn)?,
    };

    log::info!("Updating prices for {} set(s)", targets.len());

    let today = database::today_date();
    let mut failures: Vec<SyncFailure> = Vec::new();
    let mut updated = 0usize;

    for set_num in &targets {
        match sync_one(conn, client, set_num, &today).await {
            Ok(()) => {
                updated += 1;
                log::debug!("Stored price snapshot for {}", set_num);
            }
            Err(e) => {
                log::warn!("Price update failed for {}: {}", set_num, e);
                failures.push(SyncFailure {
                    set_num: set_num.clone(),
                    error: e.to_string(),
                });
            }
        }

        // Rate limit: fixed pause after every set, success or not
        tokio::time::sleep(Duration::from_millis(options.delay_ms)).await;
    }

    database::set_config_value(conn, LAST_SYNC_KEY, &chrono::Utc::now().to_rfc3339())?;

    log::info!(
        "Price update complete: {} updated, {} failed",
        updated,
        failures.len()
    );

    Ok(SyncSummary {
        updated,
        failed: failures.len(),
        failures,
    })
}
