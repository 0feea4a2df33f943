//! Shared helper functions for CLI commands.

use std::sync::Arc;

use anyhow::Context;

use crate::config::Config;
use crate::fetch::HttpFetcher;
use crate::jobs::{JobRunner, RetryPolicy};
use crate::parse::HtmlPageParser;
use crate::repository::Store;
use crate::scrape::Harvester;

/// Job runner wired to the network.
pub type LiveRunner = JobRunner<HttpFetcher, HtmlPageParser>;

pub fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::with_busy_timeout(&config.database, config.lock.busy_timeout())
        .with_context(|| format!("Failed to open database {}", config.database.display()))
}

pub fn build_runner(config: Config) -> anyhow::Result<LiveRunner> {
    let store = open_store(&config)?;
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let parser = HtmlPageParser::new(&config)?;
    let policy = RetryPolicy::from(&config.lock);
    let harvester = Harvester::new(store, fetcher, parser, Arc::new(config));
    Ok(JobRunner::new(harvester, policy))
}

/// Format a count with thousands separators.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();
    let chunks: Vec<_> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();
    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Truncate a string to `max_len` characters with ellipsis.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Dune", 10), "Dune");
        assert_eq!(truncate_string("The Left Hand of Darkness", 10), "The Lef...");
        assert_eq!(truncate_string("Ñandú Ñandú", 8), "Ñandú...");
    }
}
