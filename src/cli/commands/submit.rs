//! Submit command.

use console::style;

use crate::cli::helpers::open_store;
use crate::config::Config;
use crate::models::SearchType;
use crate::trigger::{OutboxDispatcher, Submissions};

pub fn cmd_submit(
    config: &Config,
    keyword: &str,
    search_type: SearchType,
    pages: u32,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let submissions = Submissions::new(store.clone(), OutboxDispatcher::new(store));
    let submission = submissions.submit(keyword, search_type, pages)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&submission)?);
        return Ok(());
    }

    if submission.duplicate {
        println!(
            "{} Search request #{} stored; an identical search already exists, not dispatched",
            style("!").yellow(),
            submission.request_id
        );
    } else if submission.dispatch_id.is_some() {
        println!(
            "{} Search request #{} submitted ({} {}, {} page(s))",
            style("✓").green(),
            submission.request_id,
            search_type,
            keyword.trim(),
            pages
        );
    } else {
        println!(
            "{} Search request #{} stored; dispatch failed, it will run on the next schedule tick",
            style("!").yellow(),
            submission.request_id
        );
    }
    Ok(())
}
