//! Catalog source adapters.
//!
//! Every external catalog implements [`SourceAdapter`] and translates its
//! native payloads into [`SourceRecord`]s. Adding a platform means adding one
//! implementer here; the merger and aggregator do not change.

pub mod bgmtv;
pub mod bilibili;
pub mod coerce;
pub mod http;
pub mod rate_limiter;
pub mod tmdb;

pub use bgmtv::BgmtvAdapter;
pub use bilibili::BilibiliAdapter;
pub use http::HttpFetcher;
pub use rate_limiter::RateLimiter;
pub use tmdb::TmdbAdapter;

use crate::error::{Result, SourceError};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Weekday;
use shared::{Config, SourceRecord};
use std::sync::Arc;
use tracing::{info, warn};

/// Default result size for searches
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Fetch capability shared by every catalog
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable platform tag used in `platform_links`
    fn platform(&self) -> &str;

    /// One page of the catalog's anime listing
    async fn fetch_list(&self, page: u32, page_size: u32) -> Result<Vec<SourceRecord>>;

    /// Titles matching `keyword`, at most `limit`
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<SourceRecord>>;

    /// A single title by its platform-local id
    async fn fetch_detail(&self, id: &str) -> Result<Option<SourceRecord>>;

    /// Airing schedule for one weekday, or the whole week
    async fn fetch_schedule(&self, day: Option<Weekday>) -> Result<Vec<SourceRecord>>;
}

/// Reject pagination the catalogs cannot express
pub(crate) fn check_page(page: u32, page_size: u32) -> Result<()> {
    if page == 0 || page_size == 0 {
        return Err(SourceError::InvalidArgument(format!(
            "page and page_size must be positive (page={}, page_size={})",
            page, page_size
        )));
    }
    Ok(())
}

/// Build the enabled adapters in registration order: bilibili, tmdb, bgmtv
pub fn build_adapters(config: &Config) -> anyhow::Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    let sources = &config.sources;

    if sources.bilibili.enabled {
        let adapter = BilibiliAdapter::new(&sources.bilibili, &config.http)
            .context("Failed to create bilibili adapter")?;
        adapters.push(Arc::new(adapter));
    }

    if sources.tmdb.enabled {
        match config.tmdb_api_key() {
            Some(api_key) => {
                let adapter = TmdbAdapter::new(&sources.tmdb, &config.http, api_key)
                    .context("Failed to create TMDB adapter")?;
                adapters.push(Arc::new(adapter));
            }
            None => warn!(
                env = shared::config::TMDB_API_KEY_ENV,
                "TMDB adapter not initialized: no API key configured"
            ),
        }
    }

    if sources.bgmtv.enabled {
        let adapter = BgmtvAdapter::new(&sources.bgmtv, &config.http)
            .context("Failed to create bgm.tv adapter")?;
        adapters.push(Arc::new(adapter));
    }

    info!(
        platforms = ?adapters.iter().map(|a| a.platform().to_string()).collect::<Vec<_>>(),
        "Source adapters ready"
    );

    Ok(adapters)
}
