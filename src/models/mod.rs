//! Data models for bookharvest.

mod catalog;
mod item;
mod job;
mod search;

pub use catalog::{Author, Book, CatalogCounts, Genre, Group, NewBook};
pub use item::{DiscoveredItem, GetOrCreate, ItemKind};
pub use job::{lease_holder, JobDispatch, JobLock, JobName, JobRequest, JobState, LeaseClaim};
pub use search::{Keyword, SearchRequest, SearchStatus, SearchType};
