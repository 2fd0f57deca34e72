//! Database operations for the collection store
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! All multi-row writes are transactional. Every write is an upsert keyed
//! on the row's natural key, so repeated writes are idempotent.

use crate::bricklink::PriceSnapshot;
use crate::rebrickable::RebrickableSet;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// Result type for database operations
pub type DbResult<T> = rusqlite::Result<T>;

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `set_catalog`: cached set metadata from Rebrickable
/// - `barcode_map`: barcode to set number mappings
/// - `price_history`: daily price snapshots (historical data)
/// - `inventory` / `family_members`: collection entries and owners
/// - `app_config`: key/value markers (last sync timestamp)
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS family_members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS set_catalog (
            set_num TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            year INTEGER,
            theme_name TEXT,
            theme_id INTEGER,
            num_parts INTEGER,
            set_img_url TEXT,
            last_modified_dt TEXT,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS inventory (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            set_num TEXT NOT NULL,
            owner_id INTEGER,
            quantity INTEGER NOT NULL DEFAULT 1,
            purchase_price REAL,
            date_acquired TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (set_num) REFERENCES set_catalog(set_num),
            FOREIGN KEY (owner_id) REFERENCES family_members(id)
        );

        CREATE INDEX IF NOT EXISTS idx_inventory_set_num ON inventory(set_num);
        CREATE INDEX IF NOT EXISTS idx_inventory_owner_id ON inventory(owner_id);

        -- Composite unique key: one snapshot per set per day per source
        CREATE TABLE IF NOT EXISTS price_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            set_num TEXT NOT NULL,
            date TEXT NOT NULL,
            source TEXT NOT NULL,
            avg_price REAL,
            min_price REAL,
            max_price REAL,
            currency TEXT NOT NULL DEFAULT 'USD',
            total_quantity INTEGER,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(set_num, date, source),
            FOREIGN KEY (set_num) REFERENCES set_catalog(set_num)
        );

        CREATE INDEX IF NOT EXISTS idx_price_history_set_date ON price_history(set_num, date);

        CREATE TABLE IF NOT EXISTS barcode_map (
            barcode TEXT PRIMARY KEY,
            set_num TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'upcitemdb',
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS app_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

/// Get today's date as a YYYY-MM-DD string (UTC)
pub fn today_date() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

// ── Set catalog cache ──────────────────────────────────────────────────────

/// Cached catalog record for a set
#[derive(Debug, Clone, Serialize)]
pub struct SetRecord {
    pub set_num: String,
    pub name: String,
    pub year: Option<i64>,
    pub theme_name: Option<String>,
    pub theme_id: Option<i64>,
    pub num_parts: Option<i64>,
    pub set_img_url: Option<String>,
    pub last_modified_dt: Option<String>,
    pub fetched_at: String,
}

/// Look up a cached catalog record by exact set number
pub fn get_cached_set(conn: &Connection, set_num: &str) -> DbResult<Option<SetRecord>> {
    conn.query_row(
        "SELECT set_num, name, year, theme_name, theme_id, num_parts,
                set_img_url, last_modified_dt, fetched_at
         FROM set_catalog
         WHERE set_num = ?1",
        params![set_num],
        |row| {
            Ok(SetRecord {
                set_num: row.get(0)?,
                name: row.get(1)?,
                year: row.get(2)?,
                theme_name: row.get(3)?,
                theme_id: row.get(4)?,
                num_parts: row.get(5)?,
                set_img_url: row.get(6)?,
                last_modified_dt: row.get(7)?,
                fetched_at: row.get(8)?,
            })
        },
    )
    .optional()
}

/// Upsert a catalog record keyed by the canonical set number
///
/// The row is always written fully enriched: the caller resolves the theme
/// name before calling so a cache entry is never partially populated.
pub fn upsert_set_catalog(
    conn: &Connection,
    set: &RebrickableSet,
    theme_name: Option<&str>,
) -> DbResult<()> {
    conn.execute(
        "INSERT INTO set_catalog (
            set_num, name, year, theme_name, theme_id, num_parts,
            set_img_url, last_modified_dt, fetched_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
         ON CONFLICT(set_num) DO UPDATE SET
            name = excluded.name,
            year = excluded.year,
            theme_name = excluded.theme_name,
            theme_id = excluded.theme_id,
            num_parts = excluded.num_parts,
            set_img_url = excluded.set_img_url,
            last_modified_dt = excluded.last_modified_dt,
            fetched_at = datetime('now')",
        params![
            &set.set_num,
            &set.name,
            set.year,
            theme_name,
            set.theme_id,
            set.num_parts,
            &set.set_img_url,
            &set.last_modified_dt,
        ],
    )?;
    Ok(())
}

// ── Barcode cache ──────────────────────────────────────────────────────────

/// Look up a cached barcode mapping, returning the mapped set number
pub fn get_cached_barcode(conn: &Connection, barcode: &str) -> DbResult<Option<String>> {
    conn.query_row(
        "SELECT set_num FROM barcode_map WHERE barcode = ?1",
        params![barcode],
        |row| row.get(0),
    )
    .optional()
}

/// Upsert a barcode mapping, refreshing the mapping and timestamp on conflict
pub fn upsert_barcode(conn: &Connection, barcode: &str, set_num: &str, source: &str) -> DbResult<()> {
    conn.execute(
        "INSERT INTO barcode_map (barcode, set_num, source, fetched_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(barcode) DO UPDATE SET
            set_num = excluded.set_num,
            source = excluded.source,
            fetched_at = datetime('now')",
        params![barcode, set_num, source],
    )?;
    Ok(())
}

// ── Price history ──────────────────────────────────────────────────────────

/// One stored price snapshot row
#[derive(Debug, Clone, Serialize)]
pub struct PriceRow {
    pub set_num: String,
    pub date: String,
    pub source: String,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub currency: String,
    pub total_quantity: Option<i64>,
    pub fetched_at: String,
}

fn price_row_from(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceRow> {
    Ok(PriceRow {
        set_num: row.get(0)?,
        date: row.get(1)?,
        source: row.get(2)?,
        avg_price: row.get(3)?,
        min_price: row.get(4)?,
        max_price: row.get(5)?,
        currency: row.get(6)?,
        total_quantity: row.get(7)?,
        fetched_at: row.get(8)?,
    })
}

/// Upsert a price snapshot keyed by (set_num, date, source)
///
/// Re-running a sync for the same day overwrites the numeric fields and
/// refreshes the fetch timestamp instead of inserting a duplicate row.
pub fn upsert_price_snapshot(
    conn: &Connection,
    set_num: &str,
    date: &str,
    snapshot: &PriceSnapshot,
) -> DbResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO price_history (
            set_num, date, source, avg_price, min_price, max_price,
            currency, total_quantity, fetched_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(set_num, date, source) DO UPDATE SET
            avg_price = excluded.avg_price,
            min_price = excluded.min_price,
            max_price = excluded.max_price,
            currency = excluded.currency,
            total_quantity = excluded.total_quantity,
            fetched_at = excluded.fetched_at",
    )?;
    stmt.execute(params![
        set_num,
        date,
        &snapshot.source,
        snapshot.avg_price,
        snapshot.min_price,
        snapshot.max_price,
        &snapshot.currency,
        snapshot.total_quantity,
        &snapshot.fetched_at,
    ])?;
    Ok(())
}

/// Get the latest price snapshot for a set
///
/// Same-date ties break by insertion order (highest rowid wins).
pub fn latest_price(conn: &Connection, set_num: &str) -> DbResult<Option<PriceRow>> {
    conn.query_row(
        "SELECT set_num, date, source, avg_price, min_price, max_price,
                currency, total_quantity, fetched_at
         FROM price_history
         WHERE set_num = ?1
         ORDER BY date DESC, id DESC
         LIMIT 1",
        params![set_num],
        price_row_from,
    )
    .optional()
}

/// Get price history for a set within a trailing window, oldest first
pub fn price_history_window(
    conn: &Connection,
    set_num: &str,
    days: u32,
) -> DbResult<Vec<PriceRow>> {
    let mut stmt = conn.prepare(
        "SELECT set_num, date, source, avg_price, min_price, max_price,
                currency, total_quantity, fetched_at
         FROM price_history
         WHERE set_num = ?1 AND date >= date('now', ?2)
         ORDER BY date ASC, id ASC",
    )?;
    let rows: DbResult<Vec<PriceRow>> = stmt
        .query_map(params![set_num, format!("-{} day", days)], price_row_from)?
        .collect();
    rows
}

// ── Inventory ──────────────────────────────────────────────────────────────

/// Distinct set numbers present in inventory, ascending
pub fn distinct_inventory_sets(conn: &Connection) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT set_num FROM inventory ORDER BY set_num")?;
    let rows: DbResult<Vec<String>> = stmt.query_map([], |row| row.get(0))?.collect();
    rows
}

/// Insert an inventory entry, returning its row id
pub fn insert_inventory_entry(
    conn: &Connection,
    set_num: &str,
    owner_id: Option<i64>,
    quantity: i64,
    purchase_price: Option<f64>,
    date_acquired: Option<&str>,
) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO inventory (set_num, owner_id, quantity, purchase_price, date_acquired)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![set_num, owner_id, quantity, purchase_price, date_acquired],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── App config markers ─────────────────────────────────────────────────────

/// Upsert a config value (single global row per key)
pub fn set_config_value(conn: &Connection, key: &str, value: &str) -> DbResult<()> {
    conn.execute(
        "INSERT INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

/// Read a config value
pub fn get_config_value(conn: &Connection, key: &str) -> DbResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

#[cfg(test)]
pub use tests::test_db;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bricklink::make_test_snapshot;
    use crate::rebrickable::make_test_set;

    /// Create an in-memory database for testing
    pub fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn init_schema_creates_tables() {
        let conn = test_db();

        for table in [
            "set_catalog",
            "barcode_map",
            "price_history",
            "inventory",
            "family_members",
            "app_config",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn schema_and_data_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let conn = Connection::open(&path).unwrap();
            init_schema(&conn).unwrap();
            upsert_set_catalog(&conn, &make_test_set("75192-1", "Falcon"), None).unwrap();
        }

        let conn = Connection::open(&path).unwrap();
        init_schema(&conn).unwrap();
        assert!(get_cached_set(&conn, "75192-1").unwrap().is_some());
    }

    #[test]
    fn today_date_is_iso_shaped() {
        let today = today_date();
        assert_eq!(today.len(), 10);
        assert_eq!(&today[4..5], "-");
        assert_eq!(&today[7..8], "-");
    }

    #[test]
    fn upsert_set_catalog_inserts_and_reads_back() {
        let conn = test_db();
        let set = make_test_set("75192-1", "Millennium Falcon");

        upsert_set_catalog(&conn, &set, Some("Star Wars")).unwrap();

        let record = get_cached_set(&conn, "75192-1").unwrap().unwrap();
        assert_eq!(record.set_num, "75192-1");
        assert_eq!(record.name, "Millennium Falcon");
        assert_eq!(record.theme_name.as_deref(), Some("Star Wars"));
        assert!(!record.fetched_at.is_empty());
    }

    #[test]
    fn upsert_set_catalog_overwrites_on_conflict() {
        let conn = test_db();

        upsert_set_catalog(&conn, &make_test_set("75192-1", "Falcon"), None).unwrap();
        upsert_set_catalog(
            &conn,
            &make_test_set("75192-1", "Millennium Falcon"),
            Some("Star Wars"),
        )
        .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM set_catalog", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let record = get_cached_set(&conn, "75192-1").unwrap().unwrap();
        assert_eq!(record.name, "Millennium Falcon");
        assert_eq!(record.theme_name.as_deref(), Some("Star Wars"));
    }

    #[test]
    fn get_cached_set_misses_unknown_number() {
        let conn = test_db();
        assert!(get_cached_set(&conn, "99999-1").unwrap().is_none());
    }

    #[test]
    fn barcode_mapping_round_trip_and_refresh() {
        let conn = test_db();

        assert!(get_cached_barcode(&conn, "012345").unwrap().is_none());

        upsert_barcode(&conn, "012345", "75192-1", "upcitemdb").unwrap();
        assert_eq!(
            get_cached_barcode(&conn, "012345").unwrap().as_deref(),
            Some("75192-1")
        );

        // Conflict refreshes the mapping rather than duplicating
        upsert_barcode(&conn, "012345", "10294-1", "upcitemdb").unwrap();
        assert_eq!(
            get_cached_barcode(&conn, "012345").unwrap().as_deref(),
            Some("10294-1")
        );
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM barcode_map", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn price_snapshot_upsert_is_idempotent_per_day() {
        let conn = test_db();
        upsert_set_catalog(&conn, &make_test_set("75192-1", "Falcon"), None).unwrap();

        upsert_price_snapshot(&conn, "75192-1", "2026-08-01", &make_test_snapshot(700.0)).unwrap();
        upsert_price_snapshot(&conn, "75192-1", "2026-08-01", &make_test_snapshot(725.0)).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM price_history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        // Second run's values win
        let latest = latest_price(&conn, "75192-1").unwrap().unwrap();
        assert_eq!(latest.avg_price, Some(725.0));
    }

    #[test]
    fn latest_price_prefers_newest_date_then_insertion_order() {
        let conn = test_db();
        upsert_set_catalog(&conn, &make_test_set("75192-1", "Falcon"), None).unwrap();

        upsert_price_snapshot(&conn, "75192-1", "2026-07-01", &make_test_snapshot(650.0)).unwrap();
        upsert_price_snapshot(&conn, "75192-1", "2026-08-01", &make_test_snapshot(700.0)).unwrap();

        let latest = latest_price(&conn, "75192-1").unwrap().unwrap();
        assert_eq!(latest.date, "2026-08-01");
        assert_eq!(latest.avg_price, Some(700.0));

        // Same-date rows from different sources tie-break by rowid
        let mut other = make_test_snapshot(710.0);
        other.source = "other".to_string();
        upsert_price_snapshot(&conn, "75192-1", "2026-08-01", &other).unwrap();

        let latest = latest_price(&conn, "75192-1").unwrap().unwrap();
        assert_eq!(latest.avg_price, Some(710.0));
        assert_eq!(latest.source, "other");
    }

    #[test]
    fn price_snapshot_stores_nulls() {
        let conn = test_db();
        upsert_set_catalog(&conn, &make_test_set("75192-1", "Falcon"), None).unwrap();

        let snapshot = PriceSnapshot {
            avg_price: None,
            min_price: None,
            max_price: None,
            total_quantity: None,
            ..make_test_snapshot(0.0)
        };
        upsert_price_snapshot(&conn, "75192-1", "2026-08-01", &snapshot).unwrap();

        let latest = latest_price(&conn, "75192-1").unwrap().unwrap();
        assert!(latest.avg_price.is_none());
        assert!(latest.min_price.is_none());
        assert!(latest.max_price.is_none());
        assert!(latest.total_quantity.is_none());
    }

    #[test]
    fn price_history_window_is_ascending_and_bounded() {
        let conn = test_db();
        upsert_set_catalog(&conn, &make_test_set("75192-1", "Falcon"), None).unwrap();

        let recent = chrono::Utc::now() - chrono::Duration::days(5);
        let older = chrono::Utc::now() - chrono::Duration::days(20);
        let ancient = chrono::Utc::now() - chrono::Duration::days(200);
        for (when, avg) in [(ancient, 500.0), (older, 650.0), (recent, 700.0)] {
            let date = when.format("%Y-%m-%d").to_string();
            upsert_price_snapshot(&conn, "75192-1", &date, &make_test_snapshot(avg)).unwrap();
        }

        let history = price_history_window(&conn, "75192-1", 90).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].avg_price, Some(650.0));
        assert_eq!(history[1].avg_price, Some(700.0));
    }

    #[test]
    fn distinct_inventory_sets_dedupes_and_sorts() {
        let conn = test_db();
        for set_num in ["75192-1", "10294-1", "75192-1"] {
            upsert_set_catalog(&conn, &make_test_set(set_num, "Set"), None).unwrap();
            insert_inventory_entry(&conn, set_num, None, 1, None, None).unwrap();
        }

        let sets = distinct_inventory_sets(&conn).unwrap();
        assert_eq!(sets, vec!["10294-1".to_string(), "75192-1".to_string()]);
    }

    #[test]
    fn config_value_upserts_single_row() {
        let conn = test_db();

        assert!(get_config_value(&conn, "last_price_update").unwrap().is_none());

        set_config_value(&conn, "last_price_update", "2026-08-01T00:00:00Z").unwrap();
        set_config_value(&conn, "last_price_update", "2026-08-02T00:00:00Z").unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM app_config", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            get_config_value(&conn, "last_price_update").unwrap().as_deref(),
            Some("2026-08-02T00:00:00Z")
        );
    }
}
