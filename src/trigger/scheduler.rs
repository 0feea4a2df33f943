//! Daemon loop: fire each job on its interval and drain the dispatch outbox.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::fetch::PageFetcher;
use crate::jobs::{JobError, JobOutcome, JobRunner};
use crate::models::JobName;
use crate::parse::PageParser;

pub struct Scheduler<F, P> {
    runner: Arc<JobRunner<F, P>>,
    schedule: ScheduleConfig,
}

impl<F, P> Scheduler<F, P>
where
    F: PageFetcher + 'static,
    P: PageParser + 'static,
{
    pub fn new(runner: Arc<JobRunner<F, P>>, schedule: ScheduleConfig) -> Self {
        Self { runner, schedule }
    }

    /// Run until `shutdown` resolves, then wait for in-flight jobs.
    ///
    /// Every tick spawns its job as a separate task, so a long search does not
    /// delay the sweeps; overlapping runs of the same job are kept apart by the
    /// job lease.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        let mut search = interval(secs(self.schedule.search_interval_secs));
        let mut sweep_books = interval(secs(self.schedule.sweep_books_interval_secs));
        let mut sweep_groups = interval(secs(self.schedule.sweep_groups_interval_secs));
        let mut dispatches = interval(Duration::from_millis(self.schedule.dispatch_poll_ms.max(1)));
        for timer in [&mut search, &mut sweep_books, &mut sweep_groups, &mut dispatches] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        }

        let mut jobs: JoinSet<(JobName, Result<JobOutcome, JobError>)> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = search.tick() => self.spawn(&mut jobs, JobName::SearchByKeyword),
                _ = sweep_books.tick() => self.spawn(&mut jobs, JobName::SweepRemainingBooks),
                _ = sweep_groups.tick() => self.spawn(&mut jobs, JobName::SweepRemainingGroups),
                _ = dispatches.tick() => self.drain_dispatches(&mut jobs),
                Some(joined) = jobs.join_next(), if !jobs.is_empty() => report(joined),
            }
        }

        if !jobs.is_empty() {
            println!(
                "{} Waiting for {} running job(s)...",
                style("→").dim(),
                jobs.len()
            );
        }
        while let Some(joined) = jobs.join_next().await {
            report(joined);
        }
    }

    fn spawn(&self, jobs: &mut JoinSet<(JobName, Result<JobOutcome, JobError>)>, job: JobName) {
        let runner = Arc::clone(&self.runner);
        debug!(job = %job, "Spawning job");
        jobs.spawn(async move { (job, runner.run(job).await) });
    }

    /// Start a search run right away when submissions are waiting.
    fn drain_dispatches(&self, jobs: &mut JoinSet<(JobName, Result<JobOutcome, JobError>)>) {
        match self.runner.harvester().store().take_pending_dispatches() {
            Ok(pending) if pending.is_empty() => {}
            Ok(pending) => {
                info!(count = pending.len(), "Picked up dispatched searches");
                self.spawn(jobs, JobName::SearchByKeyword);
            }
            Err(e) => warn!("Failed to read dispatch outbox: {}", e),
        }
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n.max(1))
}

fn report(joined: Result<(JobName, Result<JobOutcome, JobError>), tokio::task::JoinError>) {
    match joined {
        Ok((_, Ok(JobOutcome::Skipped))) => {}
        Ok((job, Ok(JobOutcome::Searched(batch)))) if batch.requests > 0 => {
            println!(
                "{} {}: {} request(s), {} completed, {} failed, {} new item(s)",
                style("✓").green(),
                job,
                batch.requests,
                batch.completed,
                batch.failed,
                batch.items_found
            );
        }
        Ok((job, Ok(JobOutcome::Swept(sweep)))) if sweep.attempted > 0 => {
            println!(
                "{} {}: {} of {} item(s) enriched",
                style("✓").green(),
                job,
                sweep.enriched,
                sweep.attempted
            );
        }
        Ok((_, Ok(_))) => {}
        Ok((job, Err(e))) => {
            error!(job = %job, "Job failed: {}", e);
            println!("{} {} failed: {}", style("✗").red(), job, e);
        }
        Err(e) => error!("Job task panicked: {}", e),
    }
}
