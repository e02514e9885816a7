use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ListedComic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub comic_id: i64,
    /// Epoch milliseconds.
    pub date_time: i64,
}

impl HistoryEntry {
    pub fn viewed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.date_time)
    }
}

/// A history entry joined with the listed comic it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub entry: HistoryEntry,
    pub comic: ListedComic,
}
