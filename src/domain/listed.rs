use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lightweight metadata for a comic, known whether or not its content has
/// been fetched. `favorite` and `note` are user state and live only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedComic {
    pub id: i64,
    pub title: String,
    /// `"YYYY-M-D"`, not zero-padded.
    pub date: String,
    pub favorite: bool,
    pub note: String,
}

impl ListedComic {
    pub fn new(id: i64, title: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            date: date.into(),
            favorite: false,
            note: String::new(),
        }
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        let (year, month, day) = split_date(&self.date)?;
        NaiveDate::from_ymd_opt(year, month, day)
    }

    /// Page key used by the explanation wiki, e.g. `"500:_Election"`.
    pub fn explanation_page(&self) -> String {
        format!("{}:_{}", self.id, self.title.replace(' ', "_"))
    }
}

/// Sortable key for a loosely formatted date: `year * 10000 + month * 100 + day`.
///
/// No calendar validation happens here; `"2008-2-31"` still yields a key.
pub fn date_key(date: &str) -> Option<i64> {
    let (year, month, day) = split_date(date)?;
    Some(i64::from(year) * 10_000 + i64::from(month) * 100 + i64::from(day))
}

fn split_date(date: &str) -> Option<(i32, u32, u32)> {
    let mut parts = date.trim().splitn(3, '-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    Some((year, month, day))
}

/// One row of the remote archive index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub id: i64,
    pub date: String,
    pub title: String,
}

impl From<ArchiveEntry> for ListedComic {
    fn from(entry: ArchiveEntry) -> Self {
        ListedComic::new(entry.id, entry.title, entry.date)
    }
}
