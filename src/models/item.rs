//! Items discovered on search result pages, pending or done with enrichment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SearchType;

/// Which catalog entity a discovered item enriches into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Book,
    Group,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Group => "group",
        }
    }

    /// Table holding items of this kind.
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Self::Book => "book_items",
            Self::Group => "group_items",
        }
    }

    /// Column referencing the enriched entity.
    pub(crate) fn detail_column(&self) -> &'static str {
        match self {
            Self::Book => "book_id",
            Self::Group => "group_id",
        }
    }
}

impl From<SearchType> for ItemKind {
    fn from(search_type: SearchType) -> Self {
        match search_type {
            SearchType::Books => Self::Book,
            SearchType::Groups => Self::Group,
        }
    }
}

/// A title + URL found during a keyword search.
///
/// Unique per (search_request_id, title). `detail_id` points at the book or
/// group row (depending on `kind`) once enrichment succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredItem {
    pub id: i64,
    pub kind: ItemKind,
    pub search_request_id: i64,
    pub title: String,
    pub url: String,
    pub is_scraped: bool,
    pub detail_id: Option<i64>,
    pub discovered_at: DateTime<Utc>,
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Result of an atomic get-or-create against a unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOrCreate<T> {
    pub record: T,
    /// True when this call inserted the row.
    pub created: bool,
}

impl<T> GetOrCreate<T> {
    pub fn created(record: T) -> Self {
        Self {
            record,
            created: true,
        }
    }

    pub fn existing(record: T) -> Self {
        Self {
            record,
            created: false,
        }
    }

    /// The record, only if this call created it.
    pub fn into_new(self) -> Option<T> {
        self.created.then_some(self.record)
    }
}
