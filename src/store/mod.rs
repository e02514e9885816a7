pub mod observe;
pub mod sqlite;

use tokio::sync::broadcast;

use crate::app::Result;
use crate::domain::{CachedComic, ComicQuery, HistoryEntry, HistoryRecord, ListedComic};

pub use observe::observe;
pub use sqlite::SqliteStore;

/// Tables whose changes are published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    ListedComics,
    CachedComics,
    History,
}

pub trait Store {
    // Listed comic operations
    fn get_listed_comic(&self, id: i64) -> Result<Option<ListedComic>>;
    fn search_listed_comics(&self, query: &ComicQuery) -> Result<Vec<ListedComic>>;
    fn count_listed_comics(&self, query: &ComicQuery) -> Result<i64>;
    /// Insert-or-ignore; existing rows keep their favorite and note.
    fn insert_listed_comics(&self, comics: &[ListedComic]) -> Result<usize>;
    /// Full-row replace of a single comic.
    fn replace_listed_comic(&self, comic: &ListedComic) -> Result<()>;
    fn delete_listed_comic(&self, id: i64) -> Result<()>;

    // Cached comic operations
    fn get_cached_comic(&self, id: i64) -> Result<Option<CachedComic>>;
    /// Insert-or-replace.
    fn upsert_cached_comics(&self, comics: &[CachedComic]) -> Result<usize>;

    // History operations
    fn add_history_entry(&self, comic_id: i64, date_time: i64) -> Result<i64>;
    fn get_history_for_comic(&self, comic_id: i64) -> Result<Vec<HistoryEntry>>;
    fn get_history_records(&self, limit: Option<u32>, offset: u32) -> Result<Vec<HistoryRecord>>;
    fn count_history_entries(&self) -> Result<i64>;
    fn clear_history(&self) -> Result<usize>;

    /// Receiver of table invalidations, one message per committed write.
    fn subscribe(&self) -> broadcast::Receiver<Table>;
}
