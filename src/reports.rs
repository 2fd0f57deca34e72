//! Valuation and trend reports over inventory and price history
//!
//! Pure queries against the store; no network access. The latest price for
//! a set is always the snapshot with the newest date, tie-broken by
//! insertion order among same-date rows.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::database::DbResult;

/// Whole-collection valuation totals
#[derive(Debug, Serialize)]
pub struct CollectionSummary {
    pub total_sets: i64,
    pub total_quantity: i64,
    pub total_invested: f64,
    pub total_value: f64,
    pub gain_loss: f64,
    pub roi: f64,
}

/// Per-owner valuation group
#[derive(Debug, Serialize)]
pub struct MemberValue {
    pub member_id: i64,
    pub member_name: String,
    pub set_count: i64,
    pub total_quantity: i64,
    pub invested: f64,
    pub value: f64,
    pub gain_loss: f64,
}

/// Per-theme valuation group
#[derive(Debug, Serialize)]
pub struct ThemeValue {
    pub theme_name: String,
    pub set_count: i64,
    pub total_quantity: i64,
    pub invested: f64,
    pub value: f64,
    pub gain_loss: f64,
}

/// One entry in the top-value ranking
#[derive(Debug, Serialize)]
pub struct TopSet {
    pub id: i64,
    pub set_num: String,
    pub set_name: String,
    pub theme_name: Option<String>,
    pub quantity: i64,
    pub latest_price: Option<f64>,
    pub market_value: Option<f64>,
    pub gain_loss: Option<f64>,
}

/// One entry in the movers ranking
#[derive(Debug, Serialize)]
pub struct Mover {
    pub set_num: String,
    pub set_name: String,
    pub quantity: i64,
    pub latest_price: f64,
    pub earliest_price: f64,
    pub change_value: f64,
    pub pct_change: Option<f64>,
}

/// One point of the collection-value time series
#[derive(Debug, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub total_value: f64,
}

/// One recently added inventory entry
#[derive(Debug, Serialize)]
pub struct RecentEntry {
    pub id: i64,
    pub set_num: String,
    pub set_name: String,
    pub set_img_url: Option<String>,
    pub quantity: i64,
    pub created_at: String,
}

/// Collection totals: count, quantity, invested, value, gain/loss, ROI%
///
/// Missing purchase prices and missing snapshots count as zero; ROI is 0
/// when nothing was invested.
pub fn summary(conn: &Connection) -> DbResult<CollectionSummary> {
    let (total_sets, total_quantity, total_invested, total_value) = conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(i.quantity), 0),
            COALESCE(SUM(i.quantity * COALESCE(i.purchase_price, 0)), 0),
            COALESCE(
                SUM(
                    i.quantity * COALESCE((
                        SELECT ph.avg_price
                        FROM price_history ph
                        WHERE ph.set_num = i.set_num
                        ORDER BY ph.date DESC, ph.id DESC
                        LIMIT 1
                    ), 0)
                ),
                0
            )
         FROM inventory i",
        [],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        },
    )?;

    let gain_loss = total_value - total_invested;
    let roi = if total_invested > 0.0 {
        gain_loss / total_invested * 100.0
    } else {
        0.0
    };

    Ok(CollectionSummary {
        total_sets,
        total_quantity,
        total_invested,
        total_value,
        gain_loss,
        roi,
    })
}

/// Valuation grouped by owner; entries without an owner fall into the
/// "Unassigned" group. Sorted by value descending, name ascending on ties.
pub fn value_by_member(conn: &Connection) -> DbResult<Vec<MemberValue>> {
    let mut stmt = conn.prepare(
        "SELECT
            COALESCE(fm.id, 0) AS member_id,
            COALESCE(fm.name, 'Unassigned') AS member_name,
            COUNT(i.id) AS set_count,
            COALESCE(SUM(i.quantity), 0) AS total_quantity,
            COALESCE(SUM(i.quantity * COALESCE(i.purchase_price, 0)), 0) AS invested,
            COALESCE(
                SUM(
                    i.quantity * COALESCE((
                        SELECT ph.avg_price
                        FROM price_history ph
                        WHERE ph.set_num = i.set_num
                        ORDER BY ph.date DESC, ph.id DESC
                        LIMIT 1
                    ), 0)
                ),
                0
            ) AS value
         FROM inventory i
         LEFT JOIN family_members fm ON fm.id = i.owner_id
         GROUP BY member_id, member_name
         ORDER BY value DESC, member_name ASC",
    )?;

    let rows: DbResult<Vec<MemberValue>> = stmt
        .query_map([], |row| {
            let invested: f64 = row.get(4)?;
            let value: f64 = row.get(5)?;
            Ok(MemberValue {
                member_id: row.get(0)?,
                member_name: row.get(1)?,
                set_count: row.get(2)?,
                total_quantity: row.get(3)?,
                invested,
                value,
                gain_loss: value - invested,
            })
        })?
        .collect();
    rows
}

/// Valuation grouped by theme; sets with no cached theme name fall into
/// the "Unknown" group. Sorted by value descending, name ascending on ties.
pub fn value_by_theme(conn: &Connection) -> DbResult<Vec<ThemeValue>> {
    let mut stmt = conn.prepare(
        "SELECT
            COALESCE(sc.theme_name, 'Unknown') AS theme_name,
            COUNT(i.id) AS set_count,
            COALESCE(SUM(i.quantity), 0) AS total_quantity,
            COALESCE(SUM(i.quantity * COALESCE(i.purchase_price, 0)), 0) AS invested,
            COALESCE(
                SUM(
                    i.quantity * COALESCE((
                        SELECT ph.avg_price
                        FROM price_history ph
                        WHERE ph.set_num = i.set_num
                        ORDER BY ph.date DESC, ph.id DESC
                        LIMIT 1
                    ), 0)
                ),
                0
            ) AS value
         FROM inventory i
         JOIN set_catalog sc ON sc.set_num = i.set_num
         GROUP BY theme_name
         ORDER BY value DESC, theme_name ASC",
    )?;

    let rows: DbResult<Vec<ThemeValue>> = stmt
        .query_map([], |row| {
            let invested: f64 = row.get(3)?;
            let value: f64 = row.get(4)?;
            Ok(ThemeValue {
                theme_name: row.get(0)?,
                set_count: row.get(1)?,
                total_quantity: row.get(2)?,
                invested,
                value,
                gain_loss: value - invested,
            })
        })?
        .collect();
    rows
}

/// Top entries ranked by market value (latest price x quantity)
pub fn top_sets(conn: &Connection, limit: usize) -> DbResult<Vec<TopSet>> {
    let mut stmt = conn.prepare(
        "SELECT
            i.id,
            i.set_num,
            sc.name AS set_name,
            sc.theme_name,
            i.quantity,
            i.purchase_price,
            (
                SELECT ph.avg_price
                FROM price_history ph
                WHERE ph.set_num = i.set_num
                ORDER BY ph.date DESC, ph.id DESC
                LIMIT 1
            ) AS latest_price
         FROM inventory i
         JOIN set_catalog sc ON sc.set_num = i.set_num
         ORDER BY (i.quantity * COALESCE(latest_price, 0)) DESC
         LIMIT ?1",
    )?;

    let rows: DbResult<Vec<TopSet>> = stmt
        .query_map(params![limit], |row| {
            let quantity: i64 = row.get(4)?;
            let purchase_price: Option<f64> = row.get(5)?;
            let latest_price: Option<f64> = row.get(6)?;
            let market_value = latest_price.map(|price| price * quantity as f64);
            let invested_value = purchase_price.map(|price| price * quantity as f64);
            Ok(TopSet {
                id: row.get(0)?,
                set_num: row.get(1)?,
                set_name: row.get(2)?,
                theme_name: row.get(3)?,
                quantity,
                latest_price,
                market_value,
                gain_loss: match (market_value, invested_value) {
                    (Some(value), Some(invested)) => Some(value - invested),
                    _ => None,
                },
            })
        })?
        .collect();
    rows
}

/// Biggest price movers over a trailing window
///
/// For each set with inventory, compares its earliest and latest snapshot
/// inside the window; sets lacking either endpoint are excluded. Ranked by
/// absolute change value descending.
pub fn movers(conn: &Connection, days: u32, limit: usize) -> DbResult<Vec<Mover>> {
    let window = format!("-{} day", days);
    let mut stmt = conn.prepare(
        "WITH quantities AS (
            SELECT set_num, SUM(quantity) AS quantity
            FROM inventory
            GROUP BY set_num
         ),
         latest AS (
            SELECT
                set_num,
                avg_price,
                ROW_NUMBER() OVER (PARTITION BY set_num ORDER BY date DESC, id DESC) AS rn
            FROM price_history
            WHERE date >= date('now', ?1)
         ),
         earliest AS (
            SELECT
                set_num,
                avg_price,
                ROW_NUMBER() OVER (PARTITION BY set_num ORDER BY date ASC, id ASC) AS rn
            FROM price_history
            WHERE date >= date('now', ?1)
         )
         SELECT
            q.set_num,
            sc.name AS set_name,
            q.quantity,
            l.avg_price AS latest_price,
            e.avg_price AS earliest_price,
            (COALESCE(l.avg_price, 0) - COALESCE(e.avg_price, 0)) * q.quantity AS change_value
         FROM quantities q
         JOIN set_catalog sc ON sc.set_num = q.set_num
         LEFT JOIN latest l ON l.set_num = q.set_num AND l.rn = 1
         LEFT JOIN earliest e ON e.set_num = q.set_num AND e.rn = 1
         WHERE l.avg_price IS NOT NULL AND e.avg_price IS NOT NULL
         ORDER BY ABS(change_value) DESC
         LIMIT ?2",
    )?;

    let rows: DbResult<Vec<Mover>> = stmt
        .query_map(params![window, limit], |row| {
            let latest_price: f64 = row.get(3)?;
            let earliest_price: f64 = row.get(4)?;
            Ok(Mover {
                set_num: row.get(0)?,
                set_name: row.get(1)?,
                quantity: row.get(2)?,
                latest_price,
                earliest_price,
                change_value: row.get(5)?,
                pct_change: (earliest_price != 0.0)
                    .then(|| (latest_price - earliest_price) / earliest_price * 100.0),
            })
        })?
        .collect();
    rows
}

/// Collection value over time within a trailing window
///
/// One point per snapshot date: the sum over inventory of quantity times
/// that set's snapshot average for the date (last-inserted row when a set
/// somehow has several rows for one date). Ascending by date.
pub fn trend(conn: &Connection, days: u32) -> DbResult<Vec<TrendPoint>> {
    let window = format!("-{} day", days);
    let mut stmt = conn.prepare(
        "SELECT
            ph.date,
            COALESCE(SUM(i.quantity * COALESCE(ph.avg_price, 0)), 0) AS total_value
         FROM inventory i
         JOIN price_history ph ON ph.set_num = i.set_num
         WHERE ph.date >= date('now', ?1)
           AND ph.id = (
                SELECT ph2.id
                FROM price_history ph2
                WHERE ph2.set_num = ph.set_num
                  AND ph2.date = ph.date
                ORDER BY ph2.id DESC
                LIMIT 1
           )
         GROUP BY ph.date
         ORDER BY ph.date ASC",
    )?;

    let rows: DbResult<Vec<TrendPoint>> = stmt
        .query_map(params![window], |row| {
            Ok(TrendPoint {
                date: row.get(0)?,
                total_value: row.get(1)?,
            })
        })?
        .collect();
    rows
}

/// Most recently added inventory entries
pub fn recent(conn: &Connection, limit: usize) -> DbResult<Vec<RecentEntry>> {
    let mut stmt = conn.prepare(
        "SELECT
            i.id,
            i.set_num,
            sc.name AS set_name,
            sc.set_img_url,
            i.quantity,
            i.created_at
         FROM inventory i
         JOIN set_catalog sc ON sc.set_num = i.set_num
         ORDER BY i.created_at DESC, i.id DESC
         LIMIT ?1",
    )?;

    let rows: DbResult<Vec<RecentEntry>> = stmt
        .query_map(params![limit], |row| {
            Ok(RecentEntry {
                id: row.get(0)?,
                set_num: row.get(1)?,
                set_name: row.get(2)?,
                set_img_url: row.get(3)?,
                quantity: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect();
    rows
}

#[cfg(test)]
#[path = "reports_tests.rs"]
mod tests;
