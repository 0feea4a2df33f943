//! Job dispatch outbox.

use rusqlite::{params, TransactionBehavior};

use super::helpers::row_to_dispatch;
use super::{now_rfc3339, Result, Store};
use crate::models::{JobDispatch, JobRequest};

impl Store {
    /// Append a job request to the outbox, returning its dispatch id.
    pub fn enqueue_dispatch(&self, request: &JobRequest) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO job_dispatches (
                job_name, search_request_id, keyword, search_type, page_count, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                request.job.as_str(),
                request.search_request_id,
                request.keyword,
                request.search_type.as_str(),
                request.page_count as i64,
                now_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Claim every unconsumed dispatch, oldest first.
    ///
    /// Selection and the `consumed_at` stamp share one write transaction, so
    /// each dispatch is handed to exactly one caller.
    pub fn take_pending_dispatches(&self) -> Result<Vec<JobDispatch>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pending = {
            let mut stmt = tx.prepare(
                "SELECT * FROM job_dispatches WHERE consumed_at IS NULL ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map([], row_to_dispatch)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let now = now_rfc3339();
        for dispatch in &pending {
            tx.execute(
                "UPDATE job_dispatches SET consumed_at = ?2 WHERE id = ?1",
                params![dispatch.id, now],
            )?;
        }
        tx.commit()?;

        Ok(pending)
    }

    pub fn pending_dispatch_count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM job_dispatches WHERE consumed_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}
