//! Status command for showing system state.

use chrono::Local;
use console::style;

use crate::cli::helpers::{format_number, open_store, truncate_string};
use crate::config::Config;
use crate::models::{JobName, SearchStatus};

/// Leases held longer than this are flagged as possibly stuck.
const STALE_LEASE_SECS: i64 = 3600;

pub fn cmd_status(config: &Config, limit: u32) -> anyhow::Result<()> {
    if !config.database.exists() {
        println!(
            "{} No database at {}. Run 'bookharvest init' first.",
            style("!").yellow(),
            config.database.display()
        );
        return Ok(());
    }

    let store = open_store(config)?;
    let counts = store.catalog_counts()?;
    let separator = "─".repeat(70);

    println!();
    println!(
        "{:<50} {}",
        style("bookharvest status").bold(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("{}", separator);
    println!("Database: {}", store.path().display());
    println!();

    println!("{}", style("CATALOG").cyan().bold());
    for (label, value) in [
        ("Books:", counts.books),
        ("Authors:", counts.authors),
        ("Genres:", counts.genres),
        ("Groups:", counts.groups),
    ] {
        println!("  {:<20} {:>10}", label, format_number(value));
    }
    println!(
        "  {:<20} {:>10} ({} unscraped)",
        "Book items:",
        format_number(counts.book_items),
        format_number(counts.book_items_pending)
    );
    println!(
        "  {:<20} {:>10} ({} unscraped)",
        "Group items:",
        format_number(counts.group_items),
        format_number(counts.group_items_pending)
    );
    println!();

    println!("{}", style("JOBS").cyan().bold());
    let locks = store.job_locks()?;
    for job in JobName::ALL {
        let line = match locks.iter().find(|l| l.job_name == job.as_str()) {
            None => style("never run".to_string()).dim(),
            Some(lock) if lock.is_stale(STALE_LEASE_SECS) => style(format!(
                "in_progress since {} by {} (stale?)",
                lock.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                lock.holder.as_deref().unwrap_or("unknown")
            ))
            .red(),
            Some(lock) if lock.is_held() => style(format!(
                "in_progress by {}",
                lock.holder.as_deref().unwrap_or("unknown")
            ))
            .yellow(),
            Some(lock) => style(format!(
                "{} at {}",
                lock.status.as_str(),
                lock.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            ))
            .green(),
        };
        println!("  {:<24} {}", job.as_str(), line);
    }
    println!(
        "  {:<24} {}",
        "pending dispatches",
        format_number(store.pending_dispatch_count()?)
    );
    println!();

    println!("{}", style("RECENT SEARCHES").cyan().bold());
    let recent = store.recent_search_requests(limit)?;
    if recent.is_empty() {
        println!("  {}", style("none").dim());
    }
    for request in recent {
        let status = match request.status {
            SearchStatus::Completed => style(request.status.as_str()).green(),
            SearchStatus::Failed => style(request.status.as_str()).red(),
            SearchStatus::InProgress => style(request.status.as_str()).yellow(),
            SearchStatus::Pending => style(request.status.as_str()).dim(),
        };
        println!(
            "  #{:<5} {:<30} {:<7} {:>3}p  {}{}",
            request.id,
            truncate_string(&request.keyword.title, 30),
            request.search_type.as_str(),
            request.page_count,
            status,
            if request.is_active { "" } else { " (inactive)" }
        );
        if let Some(error) = &request.last_error {
            println!("         {}", style(truncate_string(error, 60)).red());
        }
    }

    Ok(())
}
