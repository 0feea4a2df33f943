//! Authors, books, genres and groups.

use rusqlite::{params, Connection};

use super::helpers::{row_to_book, row_to_group};
use super::{now_rfc3339, to_option, Result, Store};
use crate::models::{Author, Book, CatalogCounts, Genre, GetOrCreate, Group, NewBook};

fn genre_in(conn: &Connection, title: &str) -> Result<Genre> {
    conn.execute(
        "INSERT INTO genres (title) VALUES (?1) ON CONFLICT(title) DO NOTHING",
        params![title],
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM genres WHERE title = ?1",
        params![title],
        |row| row.get(0),
    )?;
    Ok(Genre {
        id,
        title: title.to_string(),
    })
}

fn count(conn: &Connection, sql: &str) -> Result<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

impl Store {
    pub fn get_or_create_author(&self, fullname: &str) -> Result<GetOrCreate<Author>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO authors (fullname) VALUES (?1) ON CONFLICT(fullname) DO NOTHING",
            params![fullname],
        )?;
        let id: i64 = tx.query_row(
            "SELECT id FROM authors WHERE fullname = ?1",
            params![fullname],
            |row| row.get(0),
        )?;
        tx.commit()?;

        let author = Author {
            id,
            fullname: fullname.to_string(),
        };
        Ok(if inserted == 1 {
            GetOrCreate::created(author)
        } else {
            GetOrCreate::existing(author)
        })
    }

    /// Get or create a book by (author, title).
    ///
    /// Genres and their join rows are written only when this call creates the
    /// book; an existing book keeps whatever genres its first writer attached.
    pub fn get_or_create_book(
        &self,
        book: &NewBook<'_>,
        genres: &[String],
    ) -> Result<GetOrCreate<Book>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            r#"
            INSERT INTO books (author_id, title, description, thumbnail, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(author_id, title) DO NOTHING
            "#,
            params![
                book.author_id,
                book.title,
                book.description,
                book.thumbnail,
                now_rfc3339()
            ],
        )?;
        let record = tx.query_row(
            "SELECT * FROM books WHERE author_id = ?1 AND title = ?2",
            params![book.author_id, book.title],
            row_to_book,
        )?;

        if inserted == 1 {
            for title in genres {
                let genre = genre_in(&tx, title)?;
                tx.execute(
                    "INSERT INTO book_genres (book_id, genre_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
                    params![record.id, genre.id],
                )?;
            }
        }
        tx.commit()?;

        Ok(if inserted == 1 {
            GetOrCreate::created(record)
        } else {
            GetOrCreate::existing(record)
        })
    }

    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let conn = self.connect()?;
        to_option(conn.query_row(
            "SELECT * FROM books WHERE id = ?1",
            params![id],
            row_to_book,
        ))
    }

    /// Genre titles attached to a book, alphabetically.
    pub fn book_genres(&self, book_id: i64) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT g.title FROM genres g
            JOIN book_genres bg ON bg.genre_id = g.id
            WHERE bg.book_id = ?1
            ORDER BY g.title ASC
            "#,
        )?;
        let titles = stmt
            .query_map(params![book_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(titles)
    }

    /// Get or create a group by title. `thumbnail` is only written on creation.
    pub fn get_or_create_group(&self, title: &str, thumbnail: &str) -> Result<GetOrCreate<Group>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            r#"
            INSERT INTO groups (title, thumbnail, created_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(title) DO NOTHING
            "#,
            params![title, thumbnail, now_rfc3339()],
        )?;
        let record = tx.query_row(
            "SELECT * FROM groups WHERE title = ?1",
            params![title],
            row_to_group,
        )?;
        tx.commit()?;

        Ok(if inserted == 1 {
            GetOrCreate::created(record)
        } else {
            GetOrCreate::existing(record)
        })
    }

    pub fn get_group(&self, id: i64) -> Result<Option<Group>> {
        let conn = self.connect()?;
        to_option(conn.query_row(
            "SELECT * FROM groups WHERE id = ?1",
            params![id],
            row_to_group,
        ))
    }

    /// Row counts for status output.
    pub fn catalog_counts(&self) -> Result<CatalogCounts> {
        let conn = self.connect()?;
        Ok(CatalogCounts {
            books: count(&conn, "SELECT COUNT(*) FROM books")?,
            authors: count(&conn, "SELECT COUNT(*) FROM authors")?,
            genres: count(&conn, "SELECT COUNT(*) FROM genres")?,
            groups: count(&conn, "SELECT COUNT(*) FROM groups")?,
            book_items: count(&conn, "SELECT COUNT(*) FROM book_items")?,
            book_items_pending: count(
                &conn,
                "SELECT COUNT(*) FROM book_items WHERE is_scraped = 0",
            )?,
            group_items: count(&conn, "SELECT COUNT(*) FROM group_items")?,
            group_items_pending: count(
                &conn,
                "SELECT COUNT(*) FROM group_items WHERE is_scraped = 0",
            )?,
        })
    }
}
