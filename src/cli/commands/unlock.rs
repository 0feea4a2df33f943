//! Unlock command.

use console::style;

use crate::cli::helpers::open_store;
use crate::config::Config;
use crate::models::JobName;

/// Mark a job's lease completed regardless of who holds it.
pub fn cmd_unlock(config: &Config, job: JobName) -> anyhow::Result<()> {
    let store = open_store(config)?;

    match store.get_job_lock(job.as_str())? {
        None => println!("{} {} has no lease yet", style("!").yellow(), job),
        Some(lock) if !lock.is_held() => {
            println!("{} {} is not locked ({})", style("!").yellow(), job, lock.status.as_str())
        }
        Some(lock) => {
            store.release_job_lock(job.as_str())?;
            println!(
                "{} Released {} (was held by {})",
                style("✓").green(),
                job,
                lock.holder.as_deref().unwrap_or("unknown")
            );
        }
    }
    Ok(())
}
