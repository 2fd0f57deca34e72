//! Barcode lookup: UPCitemdb scan chained into set resolution
//!
//! A scanned code resolves in two hops: barcode -> set number (cached in
//! `barcode_map`, filled from UPCitemdb product titles), then set number ->
//! catalog record via the Rebrickable resolver. The cached mapping stores
//! the canonical set number the catalog resolver returned, not the raw
//! pattern match.

use crate::config::UpcLookupConfig;
use crate::database::{self, SetRecord};
use crate::error::{Error, Result};
use crate::rebrickable::{self, RebrickableClient, SetOrigin};
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Provenance tag stored with barcode mappings
pub const BARCODE_SOURCE: &str = "upcitemdb";

lazy_static! {
    // 4-6 digit set number, optionally with a single-digit variant suffix
    static ref SET_NUM_PATTERN: Regex = Regex::new(r"\b(\d{4,6}(?:-\d)?)\b").unwrap();
}

/// Extract the first embedded set number from a product title
fn extract_set_num(title: &str) -> Option<String> {
    SET_NUM_PATTERN
        .captures(title)
        .map(|captures| captures[1].to_string())
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    items: Vec<LookupItem>,
}

#[derive(Debug, Deserialize)]
struct LookupItem {
    #[serde(default)]
    title: Option<String>,
}

/// Where the barcode mapping came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarcodeOrigin {
    #[serde(rename = "cache")]
    Cache,
    #[serde(rename = "upcitemdb")]
    Remote,
}

/// A barcode resolved all the way to a catalog record
#[derive(Debug, Serialize)]
pub struct BarcodeResolution {
    pub set: SetRecord,
    pub origin: SetOrigin,
    pub barcode_origin: BarcodeOrigin,
}

/// UPCitemdb lookup client
pub struct UpcLookupClient {
    http: reqwest::Client,
    config: UpcLookupConfig,
}

impl UpcLookupClient {
    pub fn new(config: UpcLookupConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Query UPCitemdb and scan candidate titles for a set number
    async fn fetch_set_num(&self, barcode: &str) -> Result<Option<String>> {
        log::debug!("Looking up barcode {} on UPCitemdb", barcode);

        let response = self
            .http
            .get(&self.config.base_url)
            .query(&[("upc", barcode)])
            .header("User-Agent", "brick_ledger/1.0")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status()));
        }

        let payload: LookupResponse = response.json().await?;
        for item in payload.items {
            if let Some(set_num) = item.title.as_deref().and_then(extract_set_num) {
                return Ok(Some(set_num));
            }
        }
        Ok(None)
    }
}

/// Resolve a scanned barcode to a catalog record
///
/// Cache hit delegates straight to the set resolver; a miss queries
/// UPCitemdb, resolves the discovered number, then caches the barcode
/// against the canonical set number.
pub async fn resolve_barcode(
    conn: &Connection,
    catalog: &RebrickableClient,
    lookup: &UpcLookupClient,
    barcode: &str,
) -> Result<BarcodeResolution> {
    let code = barcode.trim();
    if code.is_empty() {
        return Err(Error::Config("barcode is required".to_string()));
    }

    if let Some(set_num) = database::get_cached_barcode(conn, code)? {
        log::debug!("Barcode cache hit: {} -> {}", code, set_num);
        let (set, origin) = rebrickable::resolve_set(conn, catalog, &set_num).await?;
        return Ok(BarcodeResolution {
            set,
            origin,
            barcode_origin: BarcodeOrigin::Cache,
        });
    }

    let set_num = lookup
        .fetch_set_num(code)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No LEGO set detected for barcode {}", code)))?;

    let (set, origin) = rebrickable::resolve_set(conn, catalog, &set_num).await?;
    database::upsert_barcode(conn, code, &set.set_num, BARCODE_SOURCE)?;

    log::info!("Barcode {} mapped to {}", code, set.set_num);
    Ok(BarcodeResolution {
        set,
        origin,
        barcode_origin: BarcodeOrigin::Remote,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RebrickableConfig;
    use crate::database::test_db;
    use crate::rebrickable::make_test_set;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup_client(base_url: &str) -> UpcLookupClient {
        UpcLookupClient::new(UpcLookupConfig {
            base_url: base_url.to_string(),
        })
    }

    fn catalog_client(base_url: &str) -> RebrickableClient {
        RebrickableClient::new(RebrickableConfig {
            base_url: base_url.to_string(),
            api_key: Some("test-key".to_string()),
        })
    }

    // ── extract_set_num ──────────────────────────────────────────────

    #[test]
    fn extracts_bare_set_number_from_title() {
        assert_eq!(
            extract_set_num("LEGO Star Wars 75192 Millennium Falcon"),
            Some("75192".to_string())
        );
    }

    #[test]
    fn extracts_suffixed_set_number() {
        assert_eq!(
            extract_set_num("LEGO 75192-1 Millennium Falcon"),
            Some("75192-1".to_string())
        );
    }

    #[test]
    fn takes_first_match_when_title_has_several_numbers() {
        assert_eq!(
            extract_set_num("LEGO 10294 Titanic (replaces 10241)"),
            Some("10294".to_string())
        );
    }

    #[test]
    fn ignores_numbers_outside_4_to_6_digits() {
        assert_eq!(extract_set_num("LEGO 123 pieces"), None);
        assert_eq!(extract_set_num("UPC 0673419265102"), None);
    }

    // ── resolve_barcode ──────────────────────────────────────────────

    #[tokio::test]
    async fn empty_barcode_is_a_configuration_error() {
        let conn = test_db();
        let result = resolve_barcode(
            &conn,
            &catalog_client("http://127.0.0.1:9"),
            &lookup_client("http://127.0.0.1:9"),
            "   ",
        )
        .await;

        match result {
            Err(Error::Config(msg)) => assert_eq!(msg, "barcode is required"),
            other => panic!("Expected Error::Config, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_resolution_caches_canonical_mapping() {
        let upc_server = MockServer::start().await;
        let catalog_server = MockServer::start().await;
        let conn = test_db();

        // The barcode API is consulted exactly once across both resolutions
        Mock::given(method("GET"))
            .and(path("/lookup"))
            .and(query_param("upc", "673419265102"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    { "title": "Generic brick toy" },
                    { "title": "LEGO Star Wars 75192 Millennium Falcon" }
                ]
            })))
            .expect(1)
            .mount(&upc_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/sets/75192/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&catalog_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sets/75192-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "set_num": "75192-1",
                "name": "Millennium Falcon",
                "year": 2017,
                "theme_id": null,
                "num_parts": 7541,
                "set_img_url": null,
                "last_modified_dt": null
            })))
            .mount(&catalog_server)
            .await;

        let lookup = lookup_client(&format!("{}/lookup", upc_server.uri()));
        let catalog = catalog_client(&catalog_server.uri());

        let first = resolve_barcode(&conn, &catalog, &lookup, "673419265102")
            .await
            .unwrap();
        assert_eq!(first.set.set_num, "75192-1");
        assert_eq!(first.origin, SetOrigin::Remote);
        assert_eq!(first.barcode_origin, BarcodeOrigin::Remote);

        // Mapping stores the canonical number, not the raw "75192" match
        assert_eq!(
            database::get_cached_barcode(&conn, "673419265102")
                .unwrap()
                .as_deref(),
            Some("75192-1")
        );

        // Second resolution: barcode cache + catalog cache, no API calls
        let second = resolve_barcode(&conn, &catalog, &lookup, "673419265102")
            .await
            .unwrap();
        assert_eq!(second.barcode_origin, BarcodeOrigin::Cache);
        assert_eq!(second.origin, SetOrigin::Cache);
        assert_eq!(second.set.set_num, "75192-1");
    }

    #[tokio::test]
    async fn cached_barcode_skips_lookup_api() {
        let conn = test_db();
        database::upsert_set_catalog(&conn, &make_test_set("75192-1", "Falcon"), None).unwrap();
        database::upsert_barcode(&conn, "012345", "75192-1", BARCODE_SOURCE).unwrap();

        // Both clients point at closed ports; a cache hit never dials out
        let result = resolve_barcode(
            &conn,
            &catalog_client("http://127.0.0.1:9"),
            &lookup_client("http://127.0.0.1:9"),
            "012345",
        )
        .await
        .unwrap();

        assert_eq!(result.set.set_num, "75192-1");
        assert_eq!(result.barcode_origin, BarcodeOrigin::Cache);
    }

    #[tokio::test]
    async fn no_detectable_set_number_is_not_found() {
        let upc_server = MockServer::start().await;
        let conn = test_db();

        Mock::given(method("GET"))
            .and(path("/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "title": "A toy with no number" }]
            })))
            .mount(&upc_server)
            .await;

        let result = resolve_barcode(
            &conn,
            &catalog_client("http://127.0.0.1:9"),
            &lookup_client(&format!("{}/lookup", upc_server.uri())),
            "999999999999",
        )
        .await;

        match result {
            Err(Error::NotFound(msg)) => {
                assert_eq!(msg, "No LEGO set detected for barcode 999999999999")
            }
            other => panic!("Expected Error::NotFound, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn lookup_api_failure_surfaces() {
        let upc_server = MockServer::start().await;
        let conn = test_db();

        Mock::given(method("GET"))
            .and(path("/lookup"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&upc_server)
            .await;

        let result = resolve_barcode(
            &conn,
            &catalog_client("http://127.0.0.1:9"),
            &lookup_client(&format!("{}/lookup", upc_server.uri())),
            "673419265102",
        )
        .await;

        match result {
            Err(Error::HttpStatus(status)) => {
                assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR)
            }
            other => panic!("Expected Error::HttpStatus, got: {other:?}"),
        }
    }
}
