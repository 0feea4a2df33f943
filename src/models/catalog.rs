//! Normalized catalog entities produced by enrichment.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub fullname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub title: String,
}

/// A book, unique per (author, title).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
}

/// Fields for inserting a book. Only used if no (author, title) row exists yet.
#[derive(Debug, Clone)]
pub struct NewBook<'a> {
    pub author_id: i64,
    pub title: &'a str,
    pub description: &'a str,
    pub thumbnail: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub thumbnail: String,
}

/// Row counts across the catalog, for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub books: u64,
    pub authors: u64,
    pub genres: u64,
    pub groups: u64,
    pub book_items: u64,
    pub book_items_pending: u64,
    pub group_items: u64,
    pub group_items_pending: u64,
}
