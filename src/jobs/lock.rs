//! Job lock manager: exclusive execution rights per job name.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::config::LockConfig;
use crate::models::{lease_holder, LeaseClaim};
use crate::repository::{RepositoryError, Store};

/// How hard `acquire` tries before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2))
    }
}

impl From<&LockConfig> for RetryPolicy {
    fn from(config: &LockConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay())
    }
}

/// Exclusive right to run one job. Consumed by `release()`.
///
/// Dropping an unreleased handle (early return, panic unwinding) releases the
/// lease from `Drop` and logs a warning.
#[must_use = "dropping a LockHandle releases the lease immediately"]
pub struct LockHandle {
    store: Store,
    job_name: String,
    released: bool,
}

impl LockHandle {
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Mark the job completed.
    pub fn release(mut self) -> Result<(), RepositoryError> {
        self.store.release_job_lock(&self.job_name)?;
        self.released = true;
        debug!(job = %self.job_name, "Lock released");
        Ok(())
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(job = %self.job_name, "LockHandle dropped without release, releasing now");
        if let Err(e) = self.store.release_job_lock(&self.job_name) {
            error!(job = %self.job_name, "Failed to release lock: {}", e);
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobLockManager {
    store: Store,
    holder: String,
}

impl JobLockManager {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            holder: lease_holder(),
        }
    }

    /// Try to take the lease for `job_name`.
    ///
    /// Makes `1 + max_retries` attempts, sleeping `retry_delay` between them.
    /// A lease held elsewhere or a busy database uses up one attempt; any
    /// other storage error is returned. `Ok(None)` means the retries ran out.
    pub async fn acquire(
        &self,
        job_name: &str,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Option<LockHandle>, RepositoryError> {
        let mut retries_left = max_retries;
        loop {
            match self.claim(job_name).await {
                Ok(LeaseClaim::Claimed) => {
                    debug!(job = job_name, holder = %self.holder, "Lock acquired");
                    return Ok(Some(LockHandle {
                        store: self.store.clone(),
                        job_name: job_name.to_string(),
                        released: false,
                    }));
                }
                Ok(LeaseClaim::InProgress) => {
                    debug!(job = job_name, retries_left, "Job already in progress");
                }
                Err(e) if e.is_busy() => {
                    warn!(
                        job = job_name,
                        retries_left,
                        "Database is locked, retrying in {:?}",
                        retry_delay
                    );
                }
                Err(e) => return Err(e),
            }

            if retries_left == 0 {
                debug!(job = job_name, "Lock not acquired");
                return Ok(None);
            }
            retries_left -= 1;
            tokio::time::sleep(retry_delay).await;
        }
    }

    /// One claim attempt on the blocking pool, so a busy wait inside SQLite
    /// does not stall the runtime's worker thread.
    async fn claim(&self, job_name: &str) -> Result<LeaseClaim, RepositoryError> {
        let store = self.store.clone();
        let job_name = job_name.to_string();
        let holder = self.holder.clone();
        tokio::task::spawn_blocking(move || store.try_claim_job_lock(&job_name, &holder)).await?
    }

    /// Release a handle. `None` is a no-op.
    pub fn release(&self, handle: Option<LockHandle>) -> Result<(), RepositoryError> {
        match handle {
            Some(handle) => handle.release(),
            None => Ok(()),
        }
    }

    /// Run `body` while holding the lease for `job_name`.
    ///
    /// Returns `Ok(None)` without running `body` if the lease could not be
    /// taken. The lease is released on every exit path; when `body` fails, a
    /// release failure is logged and the body's error returned.
    pub async fn run_exclusive<T, E, Fut>(
        &self,
        job_name: &str,
        policy: RetryPolicy,
        body: impl FnOnce() -> Fut,
    ) -> Result<Option<T>, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<RepositoryError>,
    {
        let Some(handle) = self
            .acquire(job_name, policy.max_retries, policy.retry_delay)
            .await?
        else {
            return Ok(None);
        };

        match body().await {
            Ok(value) => {
                handle.release()?;
                Ok(Some(value))
            }
            Err(e) => {
                if let Err(release_err) = handle.release() {
                    error!(job = job_name, "Failed to release lock: {}", release_err);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobState;
    use crate::repository::test_support::temp_store;

    #[tokio::test]
    async fn test_acquire_release() {
        let (store, _dir) = temp_store();
        let locks = JobLockManager::new(store.clone());

        let handle = locks.acquire("job", 0, Duration::ZERO).await.unwrap();
        assert!(handle.is_some());
        assert!(store.get_job_lock("job").unwrap().unwrap().is_held());

        locks.release(handle).unwrap();
        assert_eq!(
            store.get_job_lock("job").unwrap().unwrap().status,
            JobState::Completed
        );
        locks.release(None).unwrap();
    }

    #[tokio::test]
    async fn test_held_lock_exhausts_retries() {
        let (store, _dir) = temp_store();
        let locks = JobLockManager::new(store);

        let first = locks.acquire("job", 0, Duration::ZERO).await.unwrap().unwrap();
        let started = std::time::Instant::now();
        let second = locks
            .acquire("job", 2, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(second.is_none());
        // Two retries, two sleeps
        assert!(started.elapsed() >= Duration::from_millis(40));

        // The first handle is untouched and still releasable
        assert_eq!(first.job_name(), "job");
        first.release().unwrap();
        assert!(locks.acquire("job", 0, Duration::ZERO).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lock_freed_during_retries() {
        let (store, _dir) = temp_store();
        let locks = JobLockManager::new(store);
        let first = locks.acquire("job", 0, Duration::ZERO).await.unwrap().unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                locks
                    .acquire("job", 50, Duration::from_millis(10))
                    .await
                    .unwrap()
                    .map(|h| h.job_name().to_string())
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        first.release().unwrap();

        assert_eq!(waiter.await.unwrap().as_deref(), Some("job"));
    }

    #[tokio::test]
    async fn test_dropped_handle_releases() {
        let (store, _dir) = temp_store();
        let locks = JobLockManager::new(store.clone());
        {
            let _handle = locks.acquire("job", 0, Duration::ZERO).await.unwrap().unwrap();
        }
        assert!(!store.get_job_lock("job").unwrap().unwrap().is_held());
    }

    #[tokio::test]
    async fn test_run_exclusive_releases_on_error() {
        let (store, _dir) = temp_store();
        let locks = JobLockManager::new(store.clone());

        let result: Result<Option<()>, RepositoryError> = locks
            .run_exclusive("job", RetryPolicy::new(0, Duration::ZERO), || async {
                Err(RepositoryError::NotFound("boom".to_string()))
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
        assert!(!store.get_job_lock("job").unwrap().unwrap().is_held());
    }

    #[tokio::test]
    async fn test_run_exclusive_skips_when_held() {
        let (store, _dir) = temp_store();
        let locks = JobLockManager::new(store);
        let _held = locks.acquire("job", 0, Duration::ZERO).await.unwrap().unwrap();

        let mut ran = false;
        let result: Result<Option<u32>, RepositoryError> = locks
            .run_exclusive("job", RetryPolicy::new(1, Duration::ZERO), || {
                ran = true;
                async { Ok(1) }
            })
            .await;
        assert_eq!(result.unwrap(), None);
        assert!(!ran);
    }

    #[tokio::test]
    async fn test_busy_claim_leaves_runtime_free() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.db");
        let store = Store::with_busy_timeout(&path, Duration::from_millis(300)).unwrap();
        let locks = JobLockManager::new(store);

        let blocker = rusqlite::Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

        // Finishes well inside the busy wait, but only if this thread is free
        let ticker = tokio::spawn(async {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });
        let handle = locks.acquire("job", 0, Duration::ZERO).await.unwrap();
        assert!(handle.is_none());
        assert!(ticker.is_finished());

        blocker.execute_batch("ROLLBACK").unwrap();
    }

    #[tokio::test]
    async fn test_busy_database_retries_then_skips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.db");
        let store = Store::with_busy_timeout(&path, Duration::ZERO).unwrap();
        let locks = JobLockManager::new(store);

        let blocker = rusqlite::Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

        let handle = locks.acquire("job", 2, Duration::ZERO).await.unwrap();
        assert!(handle.is_none());

        blocker.execute_batch("ROLLBACK").unwrap();
        assert!(locks.acquire("job", 0, Duration::ZERO).await.unwrap().is_some());
    }
}
