//! Row parsing helpers.

use rusqlite::types::Type;

use super::{parse_datetime, parse_datetime_opt};
use crate::models::{
    Book, DiscoveredItem, Group, ItemKind, JobDispatch, JobLock, JobName, JobRequest, JobState,
    Keyword, SearchRequest, SearchStatus, SearchType,
};

/// Columns selected for a search request joined with its keyword.
pub const SEARCH_REQUEST_COLUMNS: &str = r#"
    sr.id, sr.search_type, sr.page_count, sr.is_active, sr.status, sr.processed,
    sr.last_error, sr.created_at, sr.updated_at, k.id AS keyword_id, k.title AS keyword_title
"#;

/// Map an unknown enum string to a conversion error on the given column.
fn invalid_text(column: &str, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        Type::Text,
        format!("invalid {} value: {}", column, value).into(),
    )
}

/// Parse a database row into a SearchRequest (see `SEARCH_REQUEST_COLUMNS`).
pub fn row_to_search_request(row: &rusqlite::Row) -> rusqlite::Result<SearchRequest> {
    let search_type: String = row.get("search_type")?;
    let status: String = row.get("status")?;

    Ok(SearchRequest {
        id: row.get("id")?,
        keyword: Keyword {
            id: row.get("keyword_id")?,
            title: row.get("keyword_title")?,
        },
        search_type: SearchType::from_str(&search_type)
            .ok_or_else(|| invalid_text("search_type", search_type.clone()))?,
        page_count: row.get::<_, i64>("page_count")? as u32,
        is_active: row.get::<_, i32>("is_active")? != 0,
        status: SearchStatus::from_str(&status)
            .ok_or_else(|| invalid_text("status", status.clone()))?,
        processed: row.get::<_, i32>("processed")? != 0,
        last_error: row.get("last_error")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
    })
}

/// Parse a row of `book_items` or `group_items` into a DiscoveredItem.
pub fn row_to_item(row: &rusqlite::Row, kind: ItemKind) -> rusqlite::Result<DiscoveredItem> {
    Ok(DiscoveredItem {
        id: row.get("id")?,
        kind,
        search_request_id: row.get("search_request_id")?,
        title: row.get("title")?,
        url: row.get("url")?,
        is_scraped: row.get::<_, i32>("is_scraped")? != 0,
        detail_id: row.get(kind.detail_column())?,
        discovered_at: parse_datetime(&row.get::<_, String>("discovered_at")?),
        scraped_at: parse_datetime_opt(row.get("scraped_at")?),
    })
}

pub fn row_to_book(row: &rusqlite::Row) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get("id")?,
        author_id: row.get("author_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        thumbnail: row.get("thumbnail")?,
    })
}

pub fn row_to_group(row: &rusqlite::Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get("id")?,
        title: row.get("title")?,
        thumbnail: row.get("thumbnail")?,
    })
}

pub fn row_to_job_lock(row: &rusqlite::Row) -> rusqlite::Result<JobLock> {
    let status: String = row.get("status")?;
    Ok(JobLock {
        job_name: row.get("job_name")?,
        status: JobState::from_str(&status).ok_or_else(|| invalid_text("status", status.clone()))?,
        holder: row.get("holder")?,
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
    })
}

pub fn row_to_dispatch(row: &rusqlite::Row) -> rusqlite::Result<JobDispatch> {
    let job_name: String = row.get("job_name")?;
    let search_type: String = row.get("search_type")?;
    Ok(JobDispatch {
        id: row.get("id")?,
        request: JobRequest {
            job: JobName::from_str(&job_name)
                .ok_or_else(|| invalid_text("job_name", job_name.clone()))?,
            search_request_id: row.get("search_request_id")?,
            keyword: row.get("keyword")?,
            search_type: SearchType::from_str(&search_type)
                .ok_or_else(|| invalid_text("search_type", search_type.clone()))?,
            page_count: row.get::<_, i64>("page_count")? as u32,
        },
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        consumed_at: parse_datetime_opt(row.get("consumed_at")?),
    })
}
