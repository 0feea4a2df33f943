//! Keywords and search requests.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::helpers::{row_to_search_request, SEARCH_REQUEST_COLUMNS};
use super::{now_rfc3339, to_option, RepositoryError, Result, Store};
use crate::models::{GetOrCreate, Keyword, SearchRequest, SearchStatus, SearchType};

/// A freshly inserted search request.
#[derive(Debug, Clone)]
pub struct CreatedSearch {
    pub request: SearchRequest,
    /// An equivalent (keyword, search_type, page_count) request already existed
    /// before this one was inserted.
    pub duplicate: bool,
}

/// Get or create a keyword inside an open transaction.
fn keyword_in(conn: &Connection, title: &str) -> Result<GetOrCreate<Keyword>> {
    let inserted = conn.execute(
        "INSERT INTO keywords (title) VALUES (?1) ON CONFLICT(title) DO NOTHING",
        params![title],
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM keywords WHERE title = ?1",
        params![title],
        |row| row.get(0),
    )?;
    let keyword = Keyword {
        id,
        title: title.to_string(),
    };
    Ok(if inserted == 1 {
        GetOrCreate::created(keyword)
    } else {
        GetOrCreate::existing(keyword)
    })
}

fn equivalent_exists_in(
    conn: &Connection,
    keyword: &str,
    search_type: SearchType,
    page_count: u32,
) -> Result<bool> {
    let found = conn
        .query_row(
            r#"
            SELECT 1 FROM search_requests sr
            JOIN keywords k ON k.id = sr.keyword_id
            WHERE k.title = ?1 AND sr.search_type = ?2 AND sr.page_count = ?3
            LIMIT 1
            "#,
            params![keyword, search_type.as_str(), page_count as i64],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn get_search_request_in(conn: &Connection, id: i64) -> Result<Option<SearchRequest>> {
    let sql = format!(
        "SELECT {} FROM search_requests sr JOIN keywords k ON k.id = sr.keyword_id WHERE sr.id = ?1",
        SEARCH_REQUEST_COLUMNS
    );
    to_option(conn.query_row(&sql, params![id], row_to_search_request))
}

impl Store {
    /// Get or create a keyword by title.
    pub fn get_or_create_keyword(&self, title: &str) -> Result<GetOrCreate<Keyword>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let keyword = keyword_in(&tx, title)?;
        tx.commit()?;
        Ok(keyword)
    }

    /// Insert a search request, reporting whether an equivalent one already existed.
    ///
    /// The duplicate check and the insert share one write transaction, so two
    /// concurrent submissions of the same tuple see each other.
    pub fn create_search_request(
        &self,
        keyword: &str,
        search_type: SearchType,
        page_count: u32,
    ) -> Result<CreatedSearch> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let keyword = keyword_in(&tx, keyword)?.record;
        let duplicate = equivalent_exists_in(&tx, &keyword.title, search_type, page_count)?;

        let now = now_rfc3339();
        tx.execute(
            r#"
            INSERT INTO search_requests (
                keyword_id, search_type, page_count, is_active, status, processed,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, 1, ?4, 0, ?5, ?5)
            "#,
            params![
                keyword.id,
                search_type.as_str(),
                page_count as i64,
                SearchStatus::Pending.as_str(),
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        let request = get_search_request_in(&tx, id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("search request {}", id)))?;
        tx.commit()?;

        Ok(CreatedSearch { request, duplicate })
    }

    pub fn get_search_request(&self, id: i64) -> Result<Option<SearchRequest>> {
        let conn = self.connect()?;
        get_search_request_in(&conn, id)
    }

    /// Active requests not yet processed, oldest first.
    pub fn pending_search_requests(&self) -> Result<Vec<SearchRequest>> {
        let conn = self.connect()?;
        let sql = format!(
            r#"
            SELECT {} FROM search_requests sr
            JOIN keywords k ON k.id = sr.keyword_id
            WHERE sr.is_active = 1 AND sr.processed = 0
            ORDER BY sr.id ASC
            "#,
            SEARCH_REQUEST_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let requests = stmt
            .query_map([], row_to_search_request)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    /// Most recent search requests, newest first.
    pub fn recent_search_requests(&self, limit: u32) -> Result<Vec<SearchRequest>> {
        let conn = self.connect()?;
        let sql = format!(
            r#"
            SELECT {} FROM search_requests sr
            JOIN keywords k ON k.id = sr.keyword_id
            ORDER BY sr.id DESC
            LIMIT ?1
            "#,
            SEARCH_REQUEST_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let requests = stmt
            .query_map(params![limit], row_to_search_request)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    pub fn mark_search_in_progress(&self, id: i64) -> Result<()> {
        self.update_search_status(id, SearchStatus::InProgress, false, None)
    }

    /// Mark a request completed and processed, clearing any earlier error.
    pub fn mark_search_completed(&self, id: i64) -> Result<()> {
        self.update_search_status(id, SearchStatus::Completed, true, None)
    }

    pub fn mark_search_failed(&self, id: i64, error: &str) -> Result<()> {
        self.update_search_status(id, SearchStatus::Failed, false, Some(error))
    }

    /// Stop (or resume) scraping a request without deleting it.
    pub fn set_search_active(&self, id: i64, active: bool) -> Result<()> {
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE search_requests SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, active as i32, now_rfc3339()],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(format!("search request {}", id)));
        }
        Ok(())
    }

    fn update_search_status(
        &self,
        id: i64,
        status: SearchStatus,
        processed: bool,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.connect()?;
        let updated = conn.execute(
            r#"
            UPDATE search_requests
            SET status = ?2, processed = ?3, last_error = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
            params![id, status.as_str(), processed as i32, error, now_rfc3339()],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(format!("search request {}", id)));
        }
        Ok(())
    }
}
