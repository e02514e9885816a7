pub mod cached;
pub mod history;
pub mod listed;
pub mod query;

pub use cached::{CachedComic, ComicPair, ExtraParts};
pub use history::{HistoryEntry, HistoryRecord};
pub use listed::{date_key, ArchiveEntry, ListedComic};
pub use query::{ComicQuery, ComicSort};
