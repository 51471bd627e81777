//! printmap - ordered, connection-bounded tile fetching for print maps
//!
//! A print job draws its map from many tiles and layers served by WMS and
//! TileCache endpoints. This crate fetches them concurrently, hands results
//! back in submission order, keeps outbound connections within per-host and
//! global limits and authenticates each request according to configured
//! security strategies.
//!
//! # High-Level API
//!
//! ```ignore
//! use printmap::config::ConfigFile;
//! use printmap::fetcher::FetchRequest;
//! use printmap::resources::FetchResources;
//!
//! let config = ConfigFile::load()?;
//! let resources = FetchResources::from_config(&config)?;
//!
//! let results = resources.fetch_all(tile_urls.into_iter().map(FetchRequest::get)).await?;
//! for result in results {
//!     // result.seq == position in tile_urls
//! }
//!
//! resources.destroy().await?;
//! ```

pub mod capabilities;
pub mod config;
pub mod connection;
pub mod executor;
pub mod fetcher;
pub mod http;
pub mod logging;
pub mod resources;
pub mod security;
pub mod tiers;

use std::sync::atomic::{AtomicUsize, Ordering};

/// Version of the printmap library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Raises `peak` to `current` if it is higher.
pub(crate) fn update_peak(peak: &AtomicUsize, current: usize) {
    let mut observed = peak.load(Ordering::Relaxed);
    while current > observed {
        match peak.compare_exchange_weak(observed, current, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => observed = actual,
        }
    }
}
