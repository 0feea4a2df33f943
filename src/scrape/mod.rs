//! The scrape pipeline: keyword search, item discovery and detail enrichment.
//!
//! `Harvester` owns one fetcher, one parser and the store. It never takes job
//! leases itself; `crate::jobs` wraps it in the lock manager.

mod enrich;
mod search;

pub use enrich::Enriched;
pub use search::SearchReport;

use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::fetch::{FetchError, PageFetcher};
use crate::parse::{PageParser, ParseError};
use crate::repository::{RepositoryError, Store};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl ScrapeError {
    /// Errors confined to one page or item. Callers log these and move on;
    /// anything else aborts the surrounding run.
    pub fn is_item_local(&self) -> bool {
        matches!(self, ScrapeError::Fetch(_) | ScrapeError::Parse(_))
    }
}

pub struct Harvester<F, P> {
    store: Store,
    fetcher: F,
    parser: P,
    config: Arc<Config>,
}

impl<F: PageFetcher, P: PageParser> Harvester<F, P> {
    pub fn new(store: Store, fetcher: F, parser: P, config: Arc<Config>) -> Self {
        Self {
            store,
            fetcher,
            parser,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch a page that must answer 200.
    async fn fetch_ok(&self, url: &str) -> Result<String, FetchError> {
        let page = self.fetcher.fetch(url).await?;
        if !page.is_ok() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: page.status,
            });
        }
        Ok(page.body)
    }
}
