//! Keyword search requests and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a search request looks for on the remote catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Books,
    Groups,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Books => "books",
            Self::Groups => "groups",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "books" => Some(Self::Books),
            "groups" => Some(Self::Groups),
            _ => None,
        }
    }
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A search keyword. Titles are unique and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub title: String,
}

/// A request to scrape `page_count` result pages for a keyword.
///
/// Rows are never deleted; they double as the audit trail of what was searched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub id: i64,
    pub keyword: Keyword,
    pub search_type: SearchType,
    pub page_count: u32,
    pub is_active: bool,
    pub status: SearchStatus,
    pub processed: bool,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SearchRequest {
    /// The (keyword, search_type, page_count) tuple used for duplicate detection.
    pub fn signature(&self) -> (&str, SearchType, u32) {
        (&self.keyword.title, self.search_type, self.page_count)
    }
}
