//! Run a single job.

use console::style;

use crate::cli::helpers::build_runner;
use crate::config::Config;
use crate::jobs::JobOutcome;
use crate::models::JobName;

pub async fn cmd_run(config: Config, job: JobName, json: bool) -> anyhow::Result<()> {
    let runner = build_runner(config)?;
    let outcome = runner.run(job).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        JobOutcome::Skipped => {
            println!(
                "{} {} is running elsewhere, skipped",
                style("!").yellow(),
                job
            );
        }
        JobOutcome::Searched(batch) => {
            println!(
                "{} {}: {} request(s), {} completed, {} failed",
                style("✓").green(),
                job,
                batch.requests,
                batch.completed,
                batch.failed
            );
            println!(
                "  {} new item(s), {} enriched",
                batch.items_found, batch.items_enriched
            );
        }
        JobOutcome::Swept(sweep) => {
            println!(
                "{} {}: {} attempted, {} enriched, {} failed",
                style("✓").green(),
                job,
                sweep.attempted,
                sweep.enriched,
                sweep.failed
            );
        }
    }
    Ok(())
}
