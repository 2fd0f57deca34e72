//! Brick Ledger - LEGO Collection Tracker
//!
//! Resolves set numbers and barcodes against remote catalogs into a local
//! cache, collects daily BrickLink price snapshots, and computes valuation
//! and trend reports over the accumulated history.

pub mod barcode;
pub mod bricklink;
pub mod config;
pub mod database;
pub mod error;
pub mod rebrickable;
pub mod reports;
pub mod sync;

pub use bricklink::{BricklinkClient, PriceSnapshot};
pub use error::{Error, Result};
pub use rebrickable::{RebrickableClient, SetOrigin};
pub use sync::{SyncOptions, SyncSummary};
