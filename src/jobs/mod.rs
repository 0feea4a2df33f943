//! The recurring jobs and the lease that keeps each one single-instance.

mod lock;
mod search;
mod sweep;

pub use lock::{JobLockManager, LockHandle, RetryPolicy};
pub use search::BatchReport;
pub use sweep::SweepReport;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::fetch::PageFetcher;
use crate::models::{ItemKind, JobName};
use crate::parse::PageParser;
use crate::repository::RepositoryError;
use crate::scrape::{Harvester, ScrapeError};

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] RepositoryError),
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
}

/// What one job invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Another worker held the lease; nothing ran.
    Skipped,
    Searched(BatchReport),
    Swept(SweepReport),
}

/// Runs named jobs under their lease.
pub struct JobRunner<F, P> {
    harvester: Harvester<F, P>,
    locks: JobLockManager,
    policy: RetryPolicy,
}

impl<F: PageFetcher, P: PageParser> JobRunner<F, P> {
    pub fn new(harvester: Harvester<F, P>, policy: RetryPolicy) -> Self {
        let locks = JobLockManager::new(harvester.store().clone());
        Self {
            harvester,
            locks,
            policy,
        }
    }

    pub fn harvester(&self) -> &Harvester<F, P> {
        &self.harvester
    }

    pub fn locks(&self) -> &JobLockManager {
        &self.locks
    }

    /// Run `job` if its lease can be taken, otherwise report `Skipped`.
    pub async fn run(&self, job: JobName) -> Result<JobOutcome, JobError> {
        let outcome = self
            .locks
            .run_exclusive(job.as_str(), self.policy, || self.execute(job))
            .await?;

        match outcome {
            Some(outcome) => Ok(outcome),
            None => {
                info!(job = %job, "Job already running elsewhere, skipped");
                Ok(JobOutcome::Skipped)
            }
        }
    }

    async fn execute(&self, job: JobName) -> Result<JobOutcome, JobError> {
        info!(job = %job, "Job started");
        let outcome = match job {
            JobName::SearchByKeyword => JobOutcome::Searched(self.search_pending().await?),
            JobName::SweepRemainingBooks => {
                JobOutcome::Swept(self.sweep(ItemKind::Book).await?)
            }
            JobName::SweepRemainingGroups => {
                JobOutcome::Swept(self.sweep(ItemKind::Group).await?)
            }
        };
        info!(job = %job, "Job finished");
        Ok(outcome)
    }
}
