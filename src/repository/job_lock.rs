//! Job lease rows.

use rusqlite::{params, TransactionBehavior};

use super::helpers::row_to_job_lock;
use super::{now_rfc3339, to_option, Result, Store};
use crate::models::{JobLock, JobState, LeaseClaim};

impl Store {
    /// Try to move the lease for `job_name` to `in_progress`.
    ///
    /// Runs under `BEGIN IMMEDIATE`, so the read of the current status and the
    /// compare-and-swap update happen while this connection holds the write
    /// lock. Observing `in_progress` rolls back without writing anything. A
    /// busy database surfaces as an error for which `is_busy()` is true.
    pub fn try_claim_job_lock(&self, job_name: &str, holder: &str) -> Result<LeaseClaim> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            r#"
            INSERT INTO job_locks (job_name, status, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(job_name) DO NOTHING
            "#,
            params![job_name, JobState::Idle.as_str(), now_rfc3339()],
        )?;

        let claimed = tx.execute(
            r#"
            UPDATE job_locks SET status = ?2, holder = ?3, updated_at = ?4
            WHERE job_name = ?1 AND status <> ?2
            "#,
            params![job_name, JobState::InProgress.as_str(), holder, now_rfc3339()],
        )?;

        if claimed == 1 {
            tx.commit()?;
            Ok(LeaseClaim::Claimed)
        } else {
            tx.rollback()?;
            Ok(LeaseClaim::InProgress)
        }
    }

    /// Mark the lease for `job_name` completed.
    pub fn release_job_lock(&self, job_name: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE job_locks SET status = ?2, updated_at = ?3 WHERE job_name = ?1",
            params![job_name, JobState::Completed.as_str(), now_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_job_lock(&self, job_name: &str) -> Result<Option<JobLock>> {
        let conn = self.connect()?;
        to_option(conn.query_row(
            "SELECT * FROM job_locks WHERE job_name = ?1",
            params![job_name],
            row_to_job_lock,
        ))
    }

    pub fn job_locks(&self) -> Result<Vec<JobLock>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM job_locks ORDER BY job_name ASC")?;
        let locks = stmt
            .query_map([], row_to_job_lock)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(locks)
    }
}
