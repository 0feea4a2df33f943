//! Detail enrichment of discovered items.

use tracing::{debug, info};

use super::{Harvester, ScrapeError};
use crate::fetch::PageFetcher;
use crate::models::{Book, DiscoveredItem, GetOrCreate, Group, ItemKind, NewBook};
use crate::parse::PageParser;

/// Result of enriching one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enriched {
    /// Book or group row the item now points at.
    pub detail_id: i64,
    /// The book or group was created by this enrichment.
    pub created: bool,
}

impl<F: PageFetcher, P: PageParser> Harvester<F, P> {
    /// Enrich one item and mark it scraped.
    pub async fn enrich(&self, item: &DiscoveredItem) -> Result<Enriched, ScrapeError> {
        let (detail_id, created) = match item.kind {
            ItemKind::Book => {
                let book = self.enrich_book(&item.url).await?;
                (book.record.id, book.created)
            }
            ItemKind::Group => {
                let group = self.enrich_group(&item.url).await?;
                (group.record.id, group.created)
            }
        };
        self.store.mark_item_scraped(item.kind, item.id, detail_id)?;
        Ok(Enriched { detail_id, created })
    }

    /// Fetch a book page and get-or-create its author, book and genres.
    ///
    /// Genres are attached only when the book is new.
    pub async fn enrich_book(&self, url: &str) -> Result<GetOrCreate<Book>, ScrapeError> {
        let body = self.fetch_ok(url).await?;
        let detail = self.parser.parse_book_detail(&body)?;

        let author = self.store.get_or_create_author(&detail.author_fullname)?;
        let book = self.store.get_or_create_book(
            &NewBook {
                author_id: author.record.id,
                title: &detail.title,
                description: &detail.description,
                thumbnail: &detail.thumbnail,
            },
            &detail.genres,
        )?;

        if book.created {
            info!(
                title = %book.record.title,
                author = %author.record.fullname,
                genres = detail.genres.len(),
                "New book"
            );
        } else {
            debug!(title = %book.record.title, "Book already known");
        }
        Ok(book)
    }

    /// Fetch a group page and get-or-create the group.
    pub async fn enrich_group(&self, url: &str) -> Result<GetOrCreate<Group>, ScrapeError> {
        let body = self.fetch_ok(url).await?;
        let detail = self.parser.parse_group_detail(&body)?;
        let group = self
            .store
            .get_or_create_group(&detail.title, &detail.thumbnail)?;

        if group.created {
            info!(title = %group.record.title, "New group");
        } else {
            debug!(title = %group.record.title, "Group already known");
        }
        Ok(group)
    }
}
