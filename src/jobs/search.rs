//! `search_by_keyword`: scrape every active, unprocessed search request.

use serde::Serialize;
use tracing::{error, info};

use super::{JobError, JobRunner};
use crate::fetch::PageFetcher;
use crate::parse::PageParser;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub requests: u32,
    pub completed: u32,
    pub failed: u32,
    pub items_found: u32,
    pub items_enriched: u32,
}

impl<F: PageFetcher, P: PageParser> JobRunner<F, P> {
    /// Process pending requests in creation order.
    ///
    /// A request whose stage fails is marked `failed` and the batch moves on;
    /// it is selected again on the next run. Only a failure to record status
    /// aborts the batch.
    pub(crate) async fn search_pending(&self) -> Result<BatchReport, JobError> {
        let store = self.harvester.store();
        let requests = store.pending_search_requests()?;
        let mut report = BatchReport::default();

        for request in requests {
            report.requests += 1;
            store.mark_search_in_progress(request.id)?;

            match self.harvester.search(&request).await {
                Ok(stage) => {
                    store.mark_search_completed(request.id)?;
                    report.completed += 1;
                    report.items_found += stage.items_found;
                    report.items_enriched += stage.items_enriched;
                }
                Err(e) => {
                    error!(
                        request_id = request.id,
                        keyword = %request.keyword.title,
                        "Search failed: {}",
                        e
                    );
                    store.mark_search_failed(request.id, &e.to_string())?;
                    report.failed += 1;
                }
            }
        }

        if report.requests > 0 {
            info!(
                requests = report.requests,
                completed = report.completed,
                failed = report.failed,
                items_found = report.items_found,
                "Search batch finished"
            );
        }
        Ok(report)
    }
}
