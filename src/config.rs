//! Configuration for the remote API clients
//!
//! Credentials and base URLs are explicit structs injected at client
//! construction. Base URLs are overridable so tests can point clients at a
//! mock server.

use crate::error::{Error, Result};

/// Rebrickable catalog API (set metadata + themes)
pub const REBRICKABLE_BASE_URL: &str = "https://rebrickable.com/api/v3/lego";

/// BrickLink store API (sold price guides)
pub const BRICKLINK_BASE_URL: &str = "https://api.bricklink.com/api/store/v1";

/// UPCitemdb trial lookup endpoint (barcode to product title)
pub const UPCITEMDB_BASE_URL: &str = "https://api.upcitemdb.com/prod/trial/lookup";

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Config(format!("{} is required", name)))
}

/// Rebrickable catalog configuration
///
/// The API key is optional at construction so cache-only lookups work
/// without credentials; remote fetches check for it and fail with a
/// configuration error when absent.
#[derive(Debug, Clone)]
pub struct RebrickableConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl RebrickableConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: REBRICKABLE_BASE_URL.to_string(),
            api_key: std::env::var("REBRICKABLE_API_KEY")
                .ok()
                .filter(|value| !value.is_empty()),
        }
    }
}

/// BrickLink OAuth 1.0a credentials plus base URL
///
/// All four credential values are required; `from_env` fails fast before
/// any request is signed.
#[derive(Debug, Clone)]
pub struct BricklinkConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token_value: String,
    pub token_secret: String,
}

impl BricklinkConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: BRICKLINK_BASE_URL.to_string(),
            consumer_key: require_env("BRICKLINK_CONSUMER_KEY")?,
            consumer_secret: require_env("BRICKLINK_CONSUMER_SECRET")?,
            token_value: require_env("BRICKLINK_TOKEN_VALUE")?,
            token_secret: require_env("BRICKLINK_TOKEN_SECRET")?,
        })
    }
}

/// UPCitemdb lookup configuration (the trial endpoint needs no key)
#[derive(Debug, Clone)]
pub struct UpcLookupConfig {
    pub base_url: String,
}

impl Default for UpcLookupConfig {
    fn default() -> Self {
        Self {
            base_url: UPCITEMDB_BASE_URL.to_string(),
        }
    }
}
