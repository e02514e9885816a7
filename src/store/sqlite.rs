use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};
use tokio::sync::broadcast;

use crate::app::{ComicError, Result};
use crate::domain::{
    date_key, CachedComic, ComicQuery, ExtraParts, HistoryEntry, HistoryRecord, ListedComic,
};
use crate::store::{Store, Table};

const INVALIDATION_CAPACITY: usize = 64;

const LISTED_COLUMNS: &str = "id, title, date, favorite, note";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    invalidations: broadcast::Sender<Table>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let (invalidations, _) = broadcast::channel(INVALIDATION_CAPACITY);
        let store = Self {
            conn: Mutex::new(conn),
            invalidations,
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn migrations() -> Migrations<'static> {
        Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))])
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Self::migrations().to_latest(&mut conn)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            ComicError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn notify(&self, table: Table) {
        // No receivers is fine; nobody is observing yet.
        let _ = self.invalidations.send(table);
    }

    fn listed_from_row(row: &Row, offset: usize) -> rusqlite::Result<ListedComic> {
        Ok(ListedComic {
            id: row.get(offset)?,
            title: row.get(offset + 1)?,
            date: row.get(offset + 2)?,
            favorite: row.get::<_, i32>(offset + 3)? != 0,
            note: row.get(offset + 4)?,
        })
    }

    fn cached_from_row(row: &Row) -> rusqlite::Result<CachedComic> {
        let dynamic_html = row
            .get::<_, Option<String>>(4)?
            .map(|json| serde_json::from_str::<ExtraParts>(&json))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        Ok(CachedComic {
            id: row.get(0)?,
            mouseover: row.get(1)?,
            img_url: row.get(2)?,
            transcript: row.get(3)?,
            dynamic_html,
            news_content: row.get(5)?,
            link: row.get(6)?,
        })
    }

    fn history_from_row(row: &Row) -> rusqlite::Result<HistoryEntry> {
        Ok(HistoryEntry {
            id: row.get(0)?,
            comic_id: row.get(1)?,
            date_time: row.get(2)?,
        })
    }
}

impl Store for SqliteStore {
    fn get_listed_comic(&self, id: i64) -> Result<Option<ListedComic>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {LISTED_COLUMNS} FROM listed_comics WHERE id = ?1"),
                params![id],
                |row| Self::listed_from_row(row, 0),
            )
            .optional()?;

        Ok(result)
    }

    fn search_listed_comics(&self, query: &ComicQuery) -> Result<Vec<ListedComic>> {
        let conn = self.conn()?;

        let sql = format!(
            r"SELECT {LISTED_COLUMNS} FROM listed_comics
              WHERE (?1 IS NULL OR favorite = ?1)
                AND (?2 IS NULL OR title LIKE ?2 ESCAPE '\' OR note LIKE ?2 ESCAPE '\')
              ORDER BY {}
              LIMIT ?3 OFFSET ?4",
            query.sort.order_by()
        );
        let limit = query.limit.map(i64::from).unwrap_or(-1);

        let mut stmt = conn.prepare(&sql)?;
        let comics = stmt
            .query_map(
                params![
                    query.favorite,
                    query.like_pattern(),
                    limit,
                    i64::from(query.offset)
                ],
                |row| Self::listed_from_row(row, 0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(comics)
    }

    fn count_listed_comics(&self, query: &ComicQuery) -> Result<i64> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            r"SELECT COUNT(*) FROM listed_comics
              WHERE (?1 IS NULL OR favorite = ?1)
                AND (?2 IS NULL OR title LIKE ?2 ESCAPE '\' OR note LIKE ?2 ESCAPE '\')",
            params![query.favorite, query.like_pattern()],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    fn insert_listed_comics(&self, comics: &[ListedComic]) -> Result<usize> {
        let count = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let mut count = 0;

            for comic in comics {
                count += tx.execute(
                    "INSERT OR IGNORE INTO listed_comics (id, title, date, date_key, favorite, note)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        comic.id,
                        comic.title,
                        comic.date,
                        date_key(&comic.date),
                        comic.favorite as i32,
                        comic.note
                    ],
                )?;
            }

            tx.commit()?;
            count
        };

        if count > 0 {
            tracing::debug!("Inserted {} listed comics", count);
            self.notify(Table::ListedComics);
        }
        Ok(count)
    }

    fn replace_listed_comic(&self, comic: &ListedComic) -> Result<()> {
        // Upsert rather than INSERT OR REPLACE: the latter deletes the old row
        // first, which would cascade away the comic's history.
        self.conn()?.execute(
            "INSERT INTO listed_comics (id, title, date, date_key, favorite, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 date = excluded.date,
                 date_key = excluded.date_key,
                 favorite = excluded.favorite,
                 note = excluded.note",
            params![
                comic.id,
                comic.title,
                comic.date,
                date_key(&comic.date),
                comic.favorite as i32,
                comic.note
            ],
        )?;

        self.notify(Table::ListedComics);
        Ok(())
    }

    fn delete_listed_comic(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM listed_comics WHERE id = ?1", params![id])?;

        if deleted > 0 {
            self.notify(Table::ListedComics);
            self.notify(Table::History);
        }
        Ok(())
    }

    fn get_cached_comic(&self, id: i64) -> Result<Option<CachedComic>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT id, mouseover, img_url, transcript, dynamic_html, news_content, link
                 FROM cached_comics WHERE id = ?1",
                params![id],
                Self::cached_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn upsert_cached_comics(&self, comics: &[CachedComic]) -> Result<usize> {
        let count = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let mut count = 0;

            for comic in comics {
                let dynamic_html = comic
                    .dynamic_html
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;

                count += tx.execute(
                    "INSERT OR REPLACE INTO cached_comics
                         (id, mouseover, img_url, transcript, dynamic_html, news_content, link)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        comic.id,
                        comic.mouseover,
                        comic.img_url,
                        comic.transcript,
                        dynamic_html,
                        comic.news_content,
                        comic.link
                    ],
                )?;
            }

            tx.commit()?;
            count
        };

        if count > 0 {
            self.notify(Table::CachedComics);
        }
        Ok(count)
    }

    fn add_history_entry(&self, comic_id: i64, date_time: i64) -> Result<i64> {
        let id = {
            let conn = self.conn()?;
            match conn.execute(
                "INSERT INTO history (comic_id, date_time) VALUES (?1, ?2)",
                params![comic_id, date_time],
            ) {
                Ok(_) => conn.last_insert_rowid(),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
                {
                    return Err(ComicError::ComicNotFound(comic_id));
                }
                Err(e) => return Err(e.into()),
            }
        };

        self.notify(Table::History);
        Ok(id)
    }

    fn get_history_for_comic(&self, comic_id: i64) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, comic_id, date_time FROM history
             WHERE comic_id = ?1 ORDER BY date_time DESC, id DESC",
        )?;
        let entries = stmt
            .query_map(params![comic_id], Self::history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn get_history_records(&self, limit: Option<u32>, offset: u32) -> Result<Vec<HistoryRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT h.id, h.comic_id, h.date_time,
                    c.id, c.title, c.date, c.favorite, c.note
             FROM history h
             JOIN listed_comics c ON c.id = h.comic_id
             ORDER BY h.date_time DESC, h.id DESC
             LIMIT ?1 OFFSET ?2",
        )?;
        let records = stmt
            .query_map(
                params![limit.map(i64::from).unwrap_or(-1), i64::from(offset)],
                |row| {
                    Ok(HistoryRecord {
                        entry: Self::history_from_row(row)?,
                        comic: Self::listed_from_row(row, 3)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn count_history_entries(&self) -> Result<i64> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count)
    }

    fn clear_history(&self) -> Result<usize> {
        let deleted = self.conn()?.execute("DELETE FROM history", [])?;

        tracing::info!("Cleared {} history entries", deleted);
        self.notify(Table::History);
        Ok(deleted)
    }

    fn subscribe(&self) -> broadcast::Receiver<Table> {
        self.invalidations.subscribe()
    }
}
