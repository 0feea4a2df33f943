//! reqwest-backed page fetcher.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::user_agent::resolve_user_agent;
use super::{FetchError, FetchedPage, PageFetcher, RequestDelay};
use crate::config::FetchConfig;

/// HTTP client that sleeps a random delay before every request.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    delay: RequestDelay,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let user_agent = resolve_user_agent(config.user_agent.as_deref());
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            delay: RequestDelay::new(
                std::time::Duration::from_millis(config.min_delay_ms),
                std::time::Duration::from_millis(config.max_delay_ms),
            ),
        })
    }

    pub fn delay(&self) -> RequestDelay {
        self.delay
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.delay.wait().await;

        debug!(url, "Fetching");
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        debug!(
            url,
            status,
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched"
        );
        Ok(FetchedPage { status, body })
    }
}
