//! Discovered items (book and group search hits).

use rusqlite::params;

use super::helpers::row_to_item;
use super::{now_rfc3339, to_option, RepositoryError, Result, Store};
use crate::models::{DiscoveredItem, GetOrCreate, ItemKind};

impl Store {
    /// Atomically get or create the item keyed by (search_request_id, title).
    ///
    /// `url` is only written when the row is created.
    pub fn get_or_create_item(
        &self,
        kind: ItemKind,
        search_request_id: i64,
        title: &str,
        url: &str,
    ) -> Result<GetOrCreate<DiscoveredItem>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            &format!(
                r#"
                INSERT INTO {} (search_request_id, title, url, is_scraped, discovered_at)
                VALUES (?1, ?2, ?3, 0, ?4)
                ON CONFLICT(search_request_id, title) DO NOTHING
                "#,
                kind.table()
            ),
            params![search_request_id, title, url, now_rfc3339()],
        )?;
        let item = tx.query_row(
            &format!(
                "SELECT * FROM {} WHERE search_request_id = ?1 AND title = ?2",
                kind.table()
            ),
            params![search_request_id, title],
            |row| row_to_item(row, kind),
        )?;
        tx.commit()?;

        Ok(if inserted == 1 {
            GetOrCreate::created(item)
        } else {
            GetOrCreate::existing(item)
        })
    }

    pub fn get_item(&self, kind: ItemKind, id: i64) -> Result<Option<DiscoveredItem>> {
        let conn = self.connect()?;
        to_option(conn.query_row(
            &format!("SELECT * FROM {} WHERE id = ?1", kind.table()),
            params![id],
            |row| row_to_item(row, kind),
        ))
    }

    /// Items of this kind not yet enriched, oldest first.
    pub fn unscraped_items(&self, kind: ItemKind) -> Result<Vec<DiscoveredItem>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE is_scraped = 0 ORDER BY id ASC",
            kind.table()
        ))?;
        let items = stmt
            .query_map([], |row| row_to_item(row, kind))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// All items found for a search request.
    pub fn items_for_search(
        &self,
        kind: ItemKind,
        search_request_id: i64,
    ) -> Result<Vec<DiscoveredItem>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE search_request_id = ?1 ORDER BY id ASC",
            kind.table()
        ))?;
        let items = stmt
            .query_map(params![search_request_id], |row| row_to_item(row, kind))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Link an item to its enriched book/group and flag it scraped.
    pub fn mark_item_scraped(&self, kind: ItemKind, id: i64, detail_id: i64) -> Result<()> {
        let conn = self.connect()?;
        let updated = conn.execute(
            &format!(
                "UPDATE {} SET {} = ?2, is_scraped = 1, scraped_at = ?3 WHERE id = ?1",
                kind.table(),
                kind.detail_column()
            ),
            params![id, detail_id, now_rfc3339()],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(format!(
                "{} item {}",
                kind.as_str(),
                id
            )));
        }
        Ok(())
    }
}
