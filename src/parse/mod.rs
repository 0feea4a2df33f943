//! Structured extraction from fetched pages.

mod html;

pub use html::HtmlPageParser;

use thiserror::Error;
use url::Url;

use crate::models::SearchType;

#[derive(Debug, Error)]
pub enum ParseError {
    /// A required element (or attribute) is absent. Aborts the current item.
    #[error("Missing {0}")]
    MissingElement(&'static str),
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
    #[error("No item selector configured for search type '{0}'")]
    NoItemSelector(SearchType),
}

/// One anchor on a search results page. `url` is the raw href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDetail {
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub author_fullname: String,
    /// Genre labels in page order, duplicates removed.
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDetail {
    pub title: String,
    pub thumbnail: String,
}

/// Extracts fields from page bodies. Pure functions of their input.
pub trait PageParser: Send + Sync {
    fn parse_search_results(
        &self,
        body: &str,
        search_type: SearchType,
    ) -> Result<Vec<SearchHit>, ParseError>;

    fn parse_book_detail(&self, body: &str) -> Result<BookDetail, ParseError>;

    fn parse_group_detail(&self, body: &str) -> Result<GroupDetail, ParseError>;
}

/// Resolve an href found on a page against the catalog base URL.
pub fn resolve_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base_url, href),
    }
}
