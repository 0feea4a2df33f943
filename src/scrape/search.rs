//! Search stage: walk result pages, record new items, enrich them.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Harvester, ScrapeError};
use crate::fetch::PageFetcher;
use crate::models::{DiscoveredItem, ItemKind, SearchRequest};
use crate::parse::{resolve_url, PageParser};

/// Counters for one search stage run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub pages_fetched: u32,
    pub pages_failed: u32,
    /// Items created by this run. Already-known titles are not counted.
    pub items_found: u32,
    pub items_enriched: u32,
    pub items_failed: u32,
}

impl<F: PageFetcher, P: PageParser> Harvester<F, P> {
    /// Run the search stage for one request.
    ///
    /// A page that fails to fetch or parse is skipped. Newly found items are
    /// enriched afterwards, one at a time; an item whose enrichment fails stays
    /// unscraped for the sweep. Only store errors abort the stage.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchReport, ScrapeError> {
        let kind = ItemKind::from(request.search_type);
        let keyword = request.keyword.title.as_str();
        let mut report = SearchReport::default();
        let mut found: Vec<DiscoveredItem> = Vec::new();

        info!(
            request_id = request.id,
            keyword,
            search_type = %request.search_type,
            pages = request.page_count,
            "Starting search"
        );

        for page in 1..=request.page_count {
            let url = self
                .config
                .search_url(keyword, page, request.search_type);
            match self.discover_page(request, kind, &url).await {
                Ok(mut items) => {
                    report.pages_fetched += 1;
                    info!(request_id = request.id, page, new_items = items.len(), "Page scraped");
                    found.append(&mut items);
                }
                Err(e) if e.is_item_local() => {
                    report.pages_failed += 1;
                    warn!(request_id = request.id, page, url = %url, "Skipping page: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        report.items_found = found.len() as u32;

        for item in &found {
            match self.enrich(item).await {
                Ok(enriched) => {
                    report.items_enriched += 1;
                    debug!(item_id = item.id, detail_id = enriched.detail_id, "Item enriched");
                }
                Err(e) if e.is_item_local() => {
                    report.items_failed += 1;
                    warn!(item_id = item.id, url = %item.url, "Enrichment failed: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            request_id = request.id,
            pages_fetched = report.pages_fetched,
            pages_failed = report.pages_failed,
            items_found = report.items_found,
            items_enriched = report.items_enriched,
            items_failed = report.items_failed,
            "Search finished"
        );
        Ok(report)
    }

    /// Fetch and parse one results page, returning only items it created.
    async fn discover_page(
        &self,
        request: &SearchRequest,
        kind: ItemKind,
        url: &str,
    ) -> Result<Vec<DiscoveredItem>, ScrapeError> {
        let body = self.fetch_ok(url).await?;
        let hits = self
            .parser
            .parse_search_results(&body, request.search_type)?;

        let mut created = Vec::new();
        for hit in hits {
            let item_url = resolve_url(&self.config.base_url, &hit.url);
            let item = self
                .store
                .get_or_create_item(kind, request.id, &hit.title, &item_url)?;
            if let Some(item) = item.into_new() {
                created.push(item);
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::models::SearchType;
    use crate::testing::{fixtures, harvester, MockFetcher, TEST_BASE_URL};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_search_records_and_enriches_new_items() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        let h = harvester(dir.path(), fetcher.clone());
        let request = h
            .store()
            .create_search_request("Dune", SearchType::Books, 1)
            .unwrap()
            .request;

        fetcher.page(
            &h.config().search_url("Dune", 1, SearchType::Books),
            fixtures::search_page(SearchType::Books, &[("Dune", "/book/show/1")]),
        );
        fetcher.page(
            &format!("{}/book/show/1", TEST_BASE_URL),
            fixtures::book_page("Dune", "Frank Herbert", &["Science Fiction"]),
        );

        let report = h.search(&request).await.unwrap();
        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.items_found, 1);
        assert_eq!(report.items_enriched, 1);

        let items = h.store().items_for_search(ItemKind::Book, request.id).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_scraped);
        assert!(items[0].detail_id.is_some());
    }

    #[tokio::test]
    async fn test_non_200_page_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        let h = harvester(dir.path(), fetcher.clone());
        let request = h
            .store()
            .create_search_request("Dune", SearchType::Groups, 2)
            .unwrap()
            .request;

        fetcher.status(&h.config().search_url("Dune", 1, SearchType::Groups), 503);
        fetcher.fail(
            &h.config().search_url("Dune", 2, SearchType::Groups),
            FetchError::Timeout {
                url: "page 2".to_string(),
            },
        );

        let report = h.search(&request).await.unwrap();
        assert_eq!(report.pages_failed, 2);
        assert_eq!(report.items_found, 0);
    }

    #[tokio::test]
    async fn test_failed_enrichment_leaves_item_unscraped() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        let h = harvester(dir.path(), fetcher.clone());
        let request = h
            .store()
            .create_search_request("Readers", SearchType::Groups, 1)
            .unwrap()
            .request;

        fetcher.page(
            &h.config().search_url("Readers", 1, SearchType::Groups),
            fixtures::search_page(SearchType::Groups, &[("Readers", "/group/show/1")]),
        );
        // Detail page lacks the main content block
        fetcher.page(
            &format!("{}/group/show/1", TEST_BASE_URL),
            "<html><body>gone</body></html>".to_string(),
        );

        let report = h.search(&request).await.unwrap();
        assert_eq!(report.items_found, 1);
        assert_eq!(report.items_failed, 1);
        assert_eq!(h.store().unscraped_items(ItemKind::Group).unwrap().len(), 1);
    }
}
