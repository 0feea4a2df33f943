//! Daemon command.

use std::sync::Arc;

use console::style;

use crate::cli::helpers::build_runner;
use crate::config::Config;
use crate::trigger::Scheduler;

pub async fn cmd_daemon(config: Config) -> anyhow::Result<()> {
    let schedule = config.schedule.clone();
    let runner = Arc::new(build_runner(config)?);

    println!(
        "{} Daemon started: search every {}s, sweeps every {}s/{}s (Ctrl-C to stop)",
        style("→").dim(),
        schedule.search_interval_secs,
        schedule.sweep_books_interval_secs,
        schedule.sweep_groups_interval_secs
    );

    let scheduler = Scheduler::new(runner, schedule);
    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    println!("{} Daemon stopped", style("✓").green());
    Ok(())
}
