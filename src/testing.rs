//! Test doubles and HTML fixtures shared by unit and integration tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::config::Config;
use crate::fetch::{FetchError, FetchedPage, PageFetcher};
use crate::models::JobRequest;
use crate::parse::HtmlPageParser;
use crate::repository::Store;
use crate::scrape::Harvester;
use crate::trigger::{DispatchError, JobDispatcher};

/// Base URL used by `test_config`.
pub const TEST_BASE_URL: &str = "http://catalog.test";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Defaults pointed at `TEST_BASE_URL`, with no request delay.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.base_url = TEST_BASE_URL.to_string();
    config.search_url_template = format!(
        "{}/search?q={{query}}&page={{page}}&search_type={{search_type}}&tab={{tab}}",
        TEST_BASE_URL
    );
    config.fetch.min_delay_ms = 0;
    config.fetch.max_delay_ms = 0;
    config
}

/// A harvester over a fresh database in `dir`, fetching from `fetcher`.
pub fn harvester(
    dir: &Path,
    fetcher: Arc<MockFetcher>,
) -> Harvester<Arc<MockFetcher>, HtmlPageParser> {
    let config = test_config();
    let store = Store::open(&dir.join("bookharvest.db")).unwrap_or_else(|e| panic!("{e}"));
    let parser = HtmlPageParser::new(&config).unwrap_or_else(|e| panic!("{e}"));
    Harvester::new(store, fetcher, parser, Arc::new(config))
}

#[derive(Debug, Clone)]
enum MockResponse {
    Page(FetchedPage),
    Error(FetchError),
}

/// Serves registered pages by exact URL; anything else answers 404.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, MockResponse>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with a 200 and `body`.
    pub fn page(&self, url: &str, body: String) {
        lock(&self.responses).insert(url.to_string(), MockResponse::Page(FetchedPage::ok(body)));
    }

    /// Answer `url` with an empty body and `status`.
    pub fn status(&self, url: &str, status: u16) {
        lock(&self.responses).insert(
            url.to_string(),
            MockResponse::Page(FetchedPage {
                status,
                body: String::new(),
            }),
        );
    }

    /// Fail requests for `url` with `error`.
    pub fn fail(&self, url: &str, error: FetchError) {
        lock(&self.responses).insert(url.to_string(), MockResponse::Error(error));
    }

    /// Every URL fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        lock(&self.calls).iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        lock(&self.calls).push(url.to_string());
        let response = lock(&self.responses).get(url).cloned();
        match response {
            Some(MockResponse::Page(page)) => Ok(page),
            Some(MockResponse::Error(e)) => Err(e),
            None => Ok(FetchedPage {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

/// Records dispatched job requests in memory.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    requests: Mutex<Vec<JobRequest>>,
    failing: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher that rejects every request.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<JobRequest> {
        lock(&self.requests).clone()
    }
}

impl JobDispatcher for RecordingDispatcher {
    fn dispatch(&self, request: &JobRequest) -> Result<i64, DispatchError> {
        if self.failing {
            return Err(DispatchError::Unavailable("recording dispatcher set to fail".to_string()));
        }
        let mut requests = lock(&self.requests);
        requests.push(request.clone());
        Ok(requests.len() as i64)
    }
}

/// Minimal pages matching the default selectors.
pub mod fixtures {
    use crate::models::SearchType;

    /// A results page with one anchor per `(title, href)`.
    pub fn search_page(search_type: SearchType, hits: &[(&str, &str)]) -> String {
        let class = match search_type {
            SearchType::Books => "bookTitle",
            SearchType::Groups => "groupName",
        };
        let rows: String = hits
            .iter()
            .map(|(title, href)| {
                format!(
                    r#"<tr><td><a class="{}" href="{}"><span>{}</span></a></td></tr>"#,
                    class, href, title
                )
            })
            .collect();
        format!(
            "<html><body><table class=\"tableList\">{}</table></body></html>",
            rows
        )
    }

    /// A book page with description "About {title}" and a "...more" genre toggle.
    pub fn book_page(title: &str, author: &str, genres: &[&str]) -> String {
        let mut genre_items: String = genres
            .iter()
            .map(|g| {
                format!(
                    r#"<li><a href="/genres/x"><span class="Button__labelItem">{}</span></a></li>"#,
                    g
                )
            })
            .collect();
        genre_items.push_str(r#"<li><button><span class="Button__labelItem">...more</span></button></li>"#);

        format!(
            r#"<html><body>
              <div class="BookCover"><img class="ResponsiveImage" role="presentation" src="https://img.example/{title}.jpg"></div>
              <h1 class="Text Text__title1" data-testid="bookTitle">{title}</h1>
              <div class="ContributorLinksList"><a class="ContributorLink"><span class="ContributorLink__name">{author}</span></a></div>
              <div class="DetailsLayoutRightParagraph__widthConstrained"><span class="Formatted">About {title}</span></div>
              <ul class="CollapsableList" aria-label="Top genres for this book">{genre_items}</ul>
            </body></html>"#
        )
    }

    pub fn group_page(title: &str) -> String {
        format!(
            r#"<html><body>
              <div class="leftContainer"><a class="groupPicLink" href="/group/show/1"><img src="https://img.example/{title}.png"></a></div>
              <div class="mainContentFloat"><h1>{title}</h1><p>Members</p></div>
            </body></html>"#
        )
    }
}
