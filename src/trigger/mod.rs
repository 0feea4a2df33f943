//! Getting jobs started: submissions and the periodic scheduler.
//!
//! A submission stores a search request and, only when no equivalent request
//! existed before it, hands one `JobRequest` to a `JobDispatcher` after the
//! insert has committed.

mod scheduler;

pub use scheduler::Scheduler;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::models::{JobName, JobRequest, SearchType};
use crate::repository::{RepositoryError, Store};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] RepositoryError),
    #[error("Dispatcher unavailable: {0}")]
    Unavailable(String),
}

/// Receives job requests produced by submissions.
pub trait JobDispatcher: Send + Sync {
    /// Queue `request`, returning an identifier for it.
    fn dispatch(&self, request: &JobRequest) -> Result<i64, DispatchError>;
}

/// Writes job requests to the `job_dispatches` outbox drained by the daemon.
#[derive(Debug, Clone)]
pub struct OutboxDispatcher {
    store: Store,
}

impl OutboxDispatcher {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl JobDispatcher for OutboxDispatcher {
    fn dispatch(&self, request: &JobRequest) -> Result<i64, DispatchError> {
        Ok(self.store.enqueue_dispatch(request)?)
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Keyword must not be empty")]
    EmptyKeyword,
    #[error("Page count must be greater than zero")]
    ZeroPages,
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Acknowledgement of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub request_id: i64,
    /// Set when a job request was handed to the dispatcher.
    pub dispatch_id: Option<i64>,
    /// An equivalent request existed, so nothing was dispatched.
    pub duplicate: bool,
}

pub struct Submissions<D> {
    store: Store,
    dispatcher: D,
}

impl<D: JobDispatcher> Submissions<D> {
    pub fn new(store: Store, dispatcher: D) -> Self {
        Self { store, dispatcher }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Record a search request and dispatch it at most once per
    /// (keyword, search_type, page_count).
    ///
    /// A dispatcher failure is logged, not returned: the request is already
    /// stored and the periodic `search_by_keyword` run still picks it up.
    pub fn submit(
        &self,
        keyword: &str,
        search_type: SearchType,
        page_count: u32,
    ) -> Result<Submission, SubmitError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(SubmitError::EmptyKeyword);
        }
        if page_count == 0 {
            return Err(SubmitError::ZeroPages);
        }

        let created = self
            .store
            .create_search_request(keyword, search_type, page_count)?;
        let request = created.request;

        if created.duplicate {
            info!(
                request_id = request.id,
                keyword,
                search_type = %search_type,
                page_count,
                "Equivalent search already exists, not dispatching"
            );
            return Ok(Submission {
                request_id: request.id,
                dispatch_id: None,
                duplicate: true,
            });
        }

        let (stored_keyword, search_type, page_count) = request.signature();
        let job_request = JobRequest {
            job: JobName::SearchByKeyword,
            search_request_id: request.id,
            keyword: stored_keyword.to_string(),
            search_type,
            page_count,
        };
        let dispatch_id = match self.dispatcher.dispatch(&job_request) {
            Ok(id) => {
                info!(request_id = request.id, dispatch_id = id, "Search dispatched");
                Some(id)
            }
            Err(e) => {
                error!(request_id = request.id, "Failed to dispatch search: {}", e);
                None
            }
        };

        Ok(Submission {
            request_id: request.id,
            dispatch_id,
            duplicate: false,
        })
    }
}
