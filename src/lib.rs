//! bookharvest - incremental keyword-driven catalog scraper.
//!
//! Keyword searches discover book and group items; enrichment fetches each
//! item's detail page into normalized authors, books, genres and groups.
//! Recurring jobs are kept single-instance by lease rows in SQLite.

pub mod cli;
pub mod config;
pub mod fetch;
pub mod jobs;
pub mod models;
pub mod parse;
pub mod repository;
pub mod scrape;
#[cfg(any(test, feature = "testing"))]
#[doc(hidden)]
pub mod testing;
pub mod trigger;
