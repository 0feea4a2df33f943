//! End-to-end scrape scenarios against canned pages.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bookharvest::fetch::{FetchError, FetchedPage, PageFetcher};
use bookharvest::jobs::{JobOutcome, JobRunner, RetryPolicy};
use bookharvest::models::{ItemKind, JobName, JobState, SearchStatus, SearchType};
use bookharvest::parse::HtmlPageParser;
use bookharvest::repository::Store;
use bookharvest::scrape::Harvester;
use bookharvest::testing::{fixtures, harvester, test_config, MockFetcher, TEST_BASE_URL};
use bookharvest::trigger::{OutboxDispatcher, Submissions};

type TestRunner = JobRunner<Arc<MockFetcher>, HtmlPageParser>;

fn runner(dir: &std::path::Path, fetcher: Arc<MockFetcher>) -> TestRunner {
    JobRunner::new(harvester(dir, fetcher), RetryPolicy::new(0, Duration::ZERO))
}

fn book_url(n: u32) -> String {
    format!("{}/book/show/{}", TEST_BASE_URL, n)
}

/// Register a results page per `(page, title, n)` and a detail page per book.
fn serve_books(runner: &TestRunner, fetcher: &MockFetcher, keyword: &str, pages: &[(u32, &str, u32)]) {
    let config = runner.harvester().config();
    for &(page, title, n) in pages {
        let href = format!("/book/show/{}", n);
        fetcher.page(
            &config.search_url(keyword, page, SearchType::Books),
            fixtures::search_page(SearchType::Books, &[(title, href.as_str())]),
        );
        fetcher.page(&book_url(n), fixtures::book_page(title, "Frank Herbert", &["Science Fiction"]));
    }
}

#[tokio::test]
async fn test_two_page_book_search_completes() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MockFetcher::new());
    let runner = runner(dir.path(), fetcher.clone());
    let store = runner.harvester().store().clone();
    serve_books(&runner, &fetcher, "Dune", &[(1, "Dune", 1), (2, "Dune Messiah", 2)]);

    let request = store
        .create_search_request("Dune", SearchType::Books, 2)
        .unwrap()
        .request;

    let outcome = runner.run(JobName::SearchByKeyword).await.unwrap();
    let JobOutcome::Searched(batch) = outcome else {
        panic!("unexpected outcome: {:?}", outcome);
    };
    assert_eq!(batch.requests, 1);
    assert_eq!(batch.completed, 1);
    assert_eq!(batch.items_found, 2);
    assert_eq!(batch.items_enriched, 2);

    let items = store.items_for_search(ItemKind::Book, request.id).unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.is_scraped && i.detail_id.is_some()));

    let request = store.get_search_request(request.id).unwrap().unwrap();
    assert_eq!(request.status, SearchStatus::Completed);
    assert!(request.processed);

    let counts = store.catalog_counts().unwrap();
    assert_eq!((counts.books, counts.authors, counts.genres), (2, 1, 1));

    // Lease is released after the run
    let lock = store.get_job_lock(JobName::SearchByKeyword.as_str()).unwrap().unwrap();
    assert_eq!(lock.status, JobState::Completed);

    // Processed requests are not selected again
    let JobOutcome::Searched(again) = runner.run(JobName::SearchByKeyword).await.unwrap() else {
        panic!("expected a search batch");
    };
    assert_eq!(again.requests, 0);
}

#[tokio::test]
async fn test_failed_middle_page_does_not_stop_search() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MockFetcher::new());
    let runner = runner(dir.path(), fetcher.clone());
    let store = runner.harvester().store().clone();
    serve_books(&runner, &fetcher, "Dune", &[(1, "Dune", 1), (3, "Children of Dune", 3)]);
    fetcher.fail(
        &runner.harvester().config().search_url("Dune", 2, SearchType::Books),
        FetchError::Timeout {
            url: "page 2".to_string(),
        },
    );

    let request = store
        .create_search_request("Dune", SearchType::Books, 3)
        .unwrap()
        .request;
    let report = runner.harvester().search(&request).await.unwrap();

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.pages_failed, 1);
    let config = runner.harvester().config();
    let calls = fetcher.calls();
    assert_eq!(
        &calls[..3],
        &[
            config.search_url("Dune", 1, SearchType::Books),
            config.search_url("Dune", 2, SearchType::Books),
            config.search_url("Dune", 3, SearchType::Books),
        ]
    );
    let titles: Vec<String> = store
        .items_for_search(ItemKind::Book, request.id)
        .unwrap()
        .into_iter()
        .map(|i| i.title)
        .collect();
    assert_eq!(titles, vec!["Dune", "Children of Dune"]);
}

#[tokio::test]
async fn test_repeated_search_creates_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MockFetcher::new());
    let runner = runner(dir.path(), fetcher.clone());
    let store = runner.harvester().store().clone();
    serve_books(&runner, &fetcher, "Dune", &[(1, "Dune", 1)]);

    let request = store
        .create_search_request("Dune", SearchType::Books, 1)
        .unwrap()
        .request;
    let first = runner.harvester().search(&request).await.unwrap();
    assert_eq!(first.items_found, 1);
    let items_before = store.items_for_search(ItemKind::Book, request.id).unwrap();

    // Same request again: the title is known, nothing is enriched
    let second = runner.harvester().search(&request).await.unwrap();
    assert_eq!(second.items_found, 0);
    assert_eq!(second.items_enriched, 0);
    let items_after = store.items_for_search(ItemKind::Book, request.id).unwrap();
    assert_eq!(items_after.len(), 1);
    assert_eq!(items_after[0].is_scraped, items_before[0].is_scraped);
    assert_eq!(items_after[0].detail_id, items_before[0].detail_id);
    assert_eq!(fetcher.call_count(&book_url(1)), 1);

    // A different request finding the same book reuses the existing rows
    let other = store
        .create_search_request("Dune", SearchType::Books, 2)
        .unwrap()
        .request;
    runner.harvester().search(&other).await.unwrap();
    let counts = store.catalog_counts().unwrap();
    assert_eq!((counts.books, counts.authors, counts.genres), (1, 1, 1));
    assert_eq!(counts.book_items, 2);
}

#[tokio::test]
async fn test_sweeps_converge() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MockFetcher::new());
    let runner = runner(dir.path(), fetcher.clone());
    let store = runner.harvester().store().clone();

    let search = store
        .create_search_request("Clubs", SearchType::Groups, 1)
        .unwrap()
        .request;
    for n in 1..=3 {
        let url = format!("{}/group/show/{}", TEST_BASE_URL, n);
        let title = format!("Club {}", n);
        store
            .get_or_create_item(ItemKind::Group, search.id, &title, &url)
            .unwrap();
        fetcher.page(&url, fixtures::group_page(&title));
    }

    let outcome = runner.run(JobName::SweepRemainingGroups).await.unwrap();
    let JobOutcome::Swept(sweep) = outcome else {
        panic!("unexpected outcome: {:?}", outcome);
    };
    assert_eq!((sweep.attempted, sweep.enriched, sweep.failed), (3, 3, 0));
    assert!(store.unscraped_items(ItemKind::Group).unwrap().is_empty());
    assert_eq!(store.catalog_counts().unwrap().groups, 3);

    let JobOutcome::Swept(again) = runner.run(JobName::SweepRemainingGroups).await.unwrap() else {
        panic!("expected a sweep");
    };
    assert_eq!(again.attempted, 0);
}

#[tokio::test]
async fn test_failing_item_is_retried_every_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MockFetcher::new());
    let runner = runner(dir.path(), fetcher.clone());
    let store = runner.harvester().store().clone();

    let search = store
        .create_search_request("Dune", SearchType::Books, 1)
        .unwrap()
        .request;
    store
        .get_or_create_item(ItemKind::Book, search.id, "Dune", &book_url(1))
        .unwrap();
    store
        .get_or_create_item(ItemKind::Book, search.id, "Lost", &book_url(404))
        .unwrap();
    fetcher.page(&book_url(1), fixtures::book_page("Dune", "Frank Herbert", &[]));

    for _ in 0..2 {
        let JobOutcome::Swept(sweep) = runner.run(JobName::SweepRemainingBooks).await.unwrap() else {
            panic!("expected a sweep");
        };
        assert_eq!(sweep.failed, 1);
    }
    let left = store.unscraped_items(ItemKind::Book).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].title, "Lost");
    assert_eq!(fetcher.call_count(&book_url(404)), 2);
}

#[tokio::test]
async fn test_held_lease_skips_job() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MockFetcher::new());
    let runner = runner(dir.path(), fetcher.clone());

    let held = runner
        .locks()
        .acquire(JobName::SweepRemainingBooks.as_str(), 0, Duration::ZERO)
        .await
        .unwrap()
        .unwrap();

    let outcome = runner.run(JobName::SweepRemainingBooks).await.unwrap();
    assert_eq!(outcome, JobOutcome::Skipped);

    // Other job names are unaffected
    assert!(matches!(
        runner.run(JobName::SweepRemainingGroups).await.unwrap(),
        JobOutcome::Swept(_)
    ));
    held.release().unwrap();
}

#[tokio::test]
async fn test_submission_flows_through_outbox() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MockFetcher::new());
    let runner = runner(dir.path(), fetcher.clone());
    let store = runner.harvester().store().clone();
    serve_books(&runner, &fetcher, "Dune", &[(1, "Dune", 1)]);

    let submissions = Submissions::new(store.clone(), OutboxDispatcher::new(store.clone()));
    let first = submissions.submit("Dune", SearchType::Books, 1).unwrap();
    let second = submissions.submit("Dune", SearchType::Books, 1).unwrap();
    assert!(first.dispatch_id.is_some());
    assert!(second.duplicate);
    assert_eq!(store.pending_dispatch_count().unwrap(), 1);

    let dispatched = store.take_pending_dispatches().unwrap();
    assert_eq!(dispatched[0].request.search_request_id, first.request_id);

    // Both stored requests are processed by the next run
    let JobOutcome::Searched(batch) = runner.run(JobName::SearchByKeyword).await.unwrap() else {
        panic!("expected a search batch");
    };
    assert_eq!(batch.requests, 2);
    assert_eq!(store.catalog_counts().unwrap().books, 1);
}

/// Drops the book item table right before serving `trigger`, so recording the
/// items found on that page fails in the store.
struct DropItemsFetcher {
    inner: Arc<MockFetcher>,
    db_path: PathBuf,
    trigger: String,
}

#[async_trait]
impl PageFetcher for DropItemsFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if url == self.trigger {
            let conn = rusqlite::Connection::open(&self.db_path).unwrap();
            conn.execute_batch("DROP TABLE book_items").unwrap();
        }
        self.inner.fetch(url).await
    }
}

#[tokio::test]
async fn test_store_failure_fails_request_and_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    let store = Store::open(&dir.path().join("bookharvest.db")).unwrap();

    let books_url = config.search_url("Dune", 1, SearchType::Books);
    let inner = Arc::new(MockFetcher::new());
    inner.page(
        &books_url,
        fixtures::search_page(SearchType::Books, &[("Dune", "/book/show/1")]),
    );
    let fetcher = DropItemsFetcher {
        inner,
        db_path: store.path().to_path_buf(),
        trigger: books_url,
    };
    let parser = HtmlPageParser::new(&config).unwrap();
    let runner = JobRunner::new(
        Harvester::new(store.clone(), fetcher, parser, Arc::new(config)),
        RetryPolicy::new(0, Duration::ZERO),
    );

    let books = store
        .create_search_request("Dune", SearchType::Books, 1)
        .unwrap()
        .request;
    let groups = store
        .create_search_request("Dune", SearchType::Groups, 1)
        .unwrap()
        .request;

    let JobOutcome::Searched(batch) = runner.run(JobName::SearchByKeyword).await.unwrap() else {
        panic!("expected a search batch");
    };
    assert_eq!((batch.requests, batch.completed, batch.failed), (2, 1, 1));

    let books = store.get_search_request(books.id).unwrap().unwrap();
    assert_eq!(books.status, SearchStatus::Failed);
    assert!(!books.processed);
    assert!(books.last_error.unwrap().contains("book_items"));

    // The request after the failed one still ran to completion
    let groups = store.get_search_request(groups.id).unwrap().unwrap();
    assert_eq!(groups.status, SearchStatus::Completed);
    assert!(groups.processed);

    let lock = store.get_job_lock(JobName::SearchByKeyword.as_str()).unwrap().unwrap();
    assert_eq!(lock.status, JobState::Completed);
}
