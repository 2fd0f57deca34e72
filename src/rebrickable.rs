//! Rebrickable catalog client and set resolution
//!
//! Resolution is cache-first over an ordered list of candidate identifier
//! forms. A cache hit is returned as-is; staleness is tolerated by design
//! and refresh is a separate concern, never implicit on read.

use crate::config::RebrickableConfig;
use crate::database::{self, SetRecord};
use crate::error::{Error, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Set metadata as returned by the Rebrickable API
#[derive(Debug, Clone, Deserialize)]
pub struct RebrickableSet {
    pub set_num: String,
    pub name: String,
    pub year: Option<i64>,
    pub theme_id: Option<i64>,
    pub num_parts: Option<i64>,
    pub set_img_url: Option<String>,
    pub last_modified_dt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThemeResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RebrickableSet>,
}

/// One search hit (subset of the full set record)
#[derive(Debug, Clone, Serialize)]
pub struct SetSearchResult {
    pub set_num: String,
    pub name: String,
    pub year: Option<i64>,
    pub set_img_url: Option<String>,
}

/// Where a resolved record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SetOrigin {
    Cache,
    Remote,
}

/// Candidate identifier forms to try, in order
///
/// The trimmed input as given, plus the default "-1" variant when the
/// input carries no variant suffix ("75192" and "75192-1" name the same
/// conceptual set).
pub fn candidate_set_nums(input: &str) -> Vec<String> {
    let trimmed = input.trim();
    let mut candidates = vec![trimmed.to_string()];
    if !trimmed.contains('-') {
        candidates.push(format!("{}-1", trimmed));
    }
    candidates
}

/// Rebrickable API client
pub struct RebrickableClient {
    http: reqwest::Client,
    config: RebrickableConfig,
}

impl RebrickableClient {
    pub fn new(config: RebrickableConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn require_api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("REBRICKABLE_API_KEY is required".to_string()))
    }

    /// Fetch a set by exact number; `Ok(None)` on 404
    async fn fetch_set(&self, set_num: &str) -> Result<Option<RebrickableSet>> {
        let key = self.require_api_key()?;
        let url = format!(
            "{}/sets/{}/",
            self.config.base_url,
            urlencoding::encode(set_num)
        );

        log::debug!("Fetching set from Rebrickable: {}", set_num);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("key {}", key))
            .header("User-Agent", "brick_ledger/1.0")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        Ok(Some(response.json::<RebrickableSet>().await?))
    }

    /// Resolve a theme id to its display name, best-effort
    ///
    /// Theme names are cosmetic enrichment: any failure here degrades to
    /// `None` instead of failing the resolution.
    async fn fetch_theme_name(&self, theme_id: Option<i64>) -> Option<String> {
        let theme_id = theme_id?;
        let key = self.require_api_key().ok()?;
        let url = format!("{}/themes/{}/", self.config.base_url, theme_id);

        let response = match self
            .http
            .get(&url)
            .header("Authorization", format!("key {}", key))
            .header("User-Agent", "brick_ledger/1.0")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Theme lookup failed for {}: {}", theme_id, e);
                return None;
            }
        };

        if !response.status().is_success() {
            log::warn!(
                "Theme lookup for {} returned {}",
                theme_id,
                response.status()
            );
            return None;
        }

        match response.json::<ThemeResponse>().await {
            Ok(theme) => Some(theme.name),
            Err(e) => {
                log::warn!("Theme response for {} did not parse: {}", theme_id, e);
                None
            }
        }
    }

    /// Search sets by free text, newest first
    pub async fn search_sets(&self, query: &str) -> Result<Vec<SetSearchResult>> {
        let q = query.trim();
        if q.is_empty() {
            return Ok(Vec::new());
        }

        let key = self.require_api_key()?;
        let url = format!("{}/sets/", self.config.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("search", q), ("page_size", "20"), ("ordering", "-year")])
            .header("Authorization", format!("key {}", key))
            .header("User-Agent", "brick_ledger/1.0")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        let payload: SearchResponse = response.json().await?;
        Ok(payload
            .results
            .into_iter()
            .map(|item| SetSearchResult {
                set_num: item.set_num,
                name: item.name,
                year: item.year,
                set_img_url: item.set_img_url,
            })
            .collect())
    }
}

/// Resolve a set number to its cached catalog record
///
/// Tries each candidate form against the cache, then against Rebrickable.
/// A remote 404 moves on to the next candidate; any other remote failure
/// surfaces. On a remote hit the record is written through to the cache
/// keyed by the canonical number Rebrickable returned (which may differ
/// from the candidate tried) and re-read so the caller always sees the
/// stored row.
pub async fn resolve_set(
    conn: &Connection,
    client: &RebrickableClient,
    input: &str,
) -> Result<(SetRecord, SetOrigin)> {
    let candidates = candidate_set_nums(input);

    for candidate in &candidates {
        if let Some(record) = database::get_cached_set(conn, candidate)? {
            log::debug!("Catalog cache hit for {}", candidate);
            return Ok((record, SetOrigin::Cache));
        }
    }

    for candidate in &candidates {
        let set = match client.fetch_set(candidate).await? {
            Some(set) => set,
            None => continue,
        };

        let theme_name = client.fetch_theme_name(set.theme_id).await;
        database::upsert_set_catalog(conn, &set, theme_name.as_deref())?;

        let record = database::get_cached_set(conn, &set.set_num)?
            .ok_or(Error::Database(rusqlite::Error::QueryReturnedNoRows))?;

        log::info!("Resolved {} via Rebrickable as {}", input.trim(), record.set_num);
        return Ok((record, SetOrigin::Remote));
    }

    Err(Error::NotFound(format!("Set not found: {}", input.trim())))
}

#[cfg(test)]
pub use tests::make_test_set;

#[cfg(test)]
#[path = "rebrickable_tests.rs"]
mod tests;
