//! Page retrieval.
//!
//! `PageFetcher` is the seam the scrape pipeline talks to; `HttpFetcher` is the
//! reqwest-backed implementation and `crate::testing::MockFetcher` serves
//! canned pages in tests.

mod http_client;
mod user_agent;

pub use http_client::HttpFetcher;
pub use user_agent::{resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

/// Raw response for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Retrieves pages. Implementations apply their own politeness delay.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`. Non-200 responses are returned, not turned into errors.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        (**self).fetch(url).await
    }
}

/// Uniform random delay slept before each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDelay {
    min: Duration,
    max: Duration,
}

impl RequestDelay {
    /// Bounds are swapped if given out of order.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    pub async fn wait(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
