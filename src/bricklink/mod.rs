//! BrickLink store API client for sold-price guides
//!
//! Each lookup strips the variant suffix to BrickLink's base item key and
//! fans out one signed request per condition (new and used), then folds
//! whatever data came back into a single snapshot.

pub mod oauth;

use crate::config::BricklinkConfig;
use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Provenance tag stored with every snapshot this client produces
pub const PRICE_SOURCE: &str = "bricklink";

lazy_static! {
    static ref VARIANT_SUFFIX: Regex = Regex::new(r"-\d+$").unwrap();
}

/// Strip a trailing variant suffix ("75192-1" -> "75192")
///
/// BrickLink keys price guides by the base set number.
pub fn base_set_num(set_num: &str) -> String {
    VARIANT_SUFFIX.replace(set_num, "").into_owned()
}

#[derive(Debug, Clone, Copy)]
enum Condition {
    New,
    Used,
}

impl Condition {
    fn code(self) -> &'static str {
        match self {
            Condition::New => "N",
            Condition::Used => "U",
        }
    }
}

/// Price guide payload for one condition
#[derive(Debug, Clone, Deserialize)]
pub struct GuideData {
    pub unit_price: Option<f64>,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub total_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GuideResponse {
    #[serde(default)]
    data: Option<GuideData>,
}

/// Market price statistics observed for one set on one day
#[derive(Debug, Clone, Serialize)]
pub struct PriceSnapshot {
    pub source: String,
    pub currency: String,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub total_quantity: Option<i64>,
    pub fetched_at: String,
}

impl PriceSnapshot {
    fn empty(fetched_at: String) -> Self {
        Self {
            source: PRICE_SOURCE.to_string(),
            currency: "USD".to_string(),
            avg_price: None,
            min_price: None,
            max_price: None,
            total_quantity: None,
            fetched_at,
        }
    }
}

/// BrickLink API client with injected OAuth credentials
pub struct BricklinkClient {
    http: reqwest::Client,
    config: BricklinkConfig,
}

impl BricklinkClient {
    pub fn new(config: BricklinkConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Fetch the sold-price guide for one condition
    ///
    /// Returns `Ok(None)` when BrickLink has no guide data for this
    /// condition; non-success statuses are errors.
    async fn fetch_guide(&self, base_set_num: &str, condition: Condition) -> Result<Option<GuideData>> {
        let url = format!(
            "{}/items/set/{}/price",
            self.config.base_url,
            urlencoding::encode(base_set_num)
        );
        let query = [
            ("guide_type", "sold"),
            ("new_or_used", condition.code()),
            ("currency_code", "USD"),
        ];

        let authorization = oauth::build_authorization_header(&self.config, "GET", &url, &query);

        let response = self
            .http
            .get(&url)
            .query(&query)
            .header("Authorization", authorization)
            .header("User-Agent", "brick_ledger/1.0")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        let payload: GuideResponse = response.json().await?;
        Ok(payload.data)
    }

    /// Fetch and combine the new/used sold-price guides for a set
    ///
    /// The two condition requests run concurrently. A condition with no
    /// guide data is skipped; if neither has data the snapshot carries all
    /// null prices rather than failing.
    pub async fn get_price(&self, set_num: &str) -> Result<PriceSnapshot> {
        let base = base_set_num(set_num.trim());
        log::debug!("Fetching BrickLink sold-price guides for {}", base);

        let (new_guide, used_guide) = tokio::join!(
            self.fetch_guide(&base, Condition::New),
            self.fetch_guide(&base, Condition::Used)
        );

        let candidates: Vec<GuideData> = [new_guide?, used_guide?].into_iter().flatten().collect();
        let fetched_at = chrono::Utc::now().to_rfc3339();

        if candidates.is_empty() {
            log::debug!("No guide data for {} in either condition", base);
            return Ok(PriceSnapshot::empty(fetched_at));
        }

        let avg = candidates
            .iter()
            .map(|guide| guide.avg_price.or(guide.unit_price).unwrap_or(0.0))
            .sum::<f64>()
            / candidates.len() as f64;

        Ok(PriceSnapshot {
            source: PRICE_SOURCE.to_string(),
            currency: "USD".to_string(),
            avg_price: avg.is_finite().then_some(avg),
            min_price: candidates.iter().filter_map(|g| g.min_price).reduce(f64::min),
            max_price: candidates.iter().filter_map(|g| g.max_price).reduce(f64::max),
            total_quantity: candidates
                .iter()
                .filter_map(|g| g.total_quantity)
                .reduce(|a, b| a + b),
            fetched_at,
        })
    }
}

#[cfg(test)]
pub use tests::make_test_snapshot;

#[cfg(test)]
#[path = "price_tests.rs"]
mod tests;
