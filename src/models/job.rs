//! Job names, lease rows and dispatch records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SearchType;

/// The named recurring jobs. Each name is mutually exclusive with itself only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    /// Scrape every active, unprocessed search request.
    #[value(name = "search_by_keyword")]
    SearchByKeyword,
    /// Enrich book items left unscraped by earlier runs.
    #[value(name = "sweep_remaining_books")]
    SweepRemainingBooks,
    /// Enrich group items left unscraped by earlier runs.
    #[value(name = "sweep_remaining_groups")]
    SweepRemainingGroups,
}

impl JobName {
    pub const ALL: [JobName; 3] = [
        Self::SearchByKeyword,
        Self::SweepRemainingBooks,
        Self::SweepRemainingGroups,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchByKeyword => "search_by_keyword",
            Self::SweepRemainingBooks => "sweep_remaining_books",
            Self::SweepRemainingGroups => "sweep_remaining_groups",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "search_by_keyword" => Some(Self::SearchByKeyword),
            "sweep_remaining_books" => Some(Self::SweepRemainingBooks),
            "sweep_remaining_groups" => Some(Self::SweepRemainingGroups),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lease state of a job lock row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    InProgress,
    Completed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Lease row coordinating exclusive execution of one job name across workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLock {
    pub job_name: String,
    pub status: JobState,
    /// Worker that last moved the lease to `in_progress` (informational).
    pub holder: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobLock {
    pub fn is_held(&self) -> bool {
        self.status == JobState::InProgress
    }

    /// Check if the lease has been held longer than `threshold_secs`.
    pub fn is_stale(&self, threshold_secs: i64) -> bool {
        let age = Utc::now() - self.updated_at;
        self.is_held() && age.num_seconds() > threshold_secs
    }
}

/// Outcome of one attempt to move a lease to `in_progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseClaim {
    Claimed,
    /// Another worker holds the lease.
    InProgress,
}

/// Identity recorded on leases taken by this process.
pub fn lease_holder() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}:{}", host, std::process::id())
}

/// A request to run a search job for a freshly created search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job: JobName,
    pub search_request_id: i64,
    pub keyword: String,
    pub search_type: SearchType,
    pub page_count: u32,
}

/// A persisted job request waiting in the dispatch outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDispatch {
    pub id: i64,
    pub request: JobRequest,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}
