use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ComicSort {
    /// Newest first, same as `date-newest`.
    #[default]
    #[serde(rename = "default")]
    #[value(name = "default")]
    Default,
    #[serde(rename = "date-newest")]
    #[value(name = "date-newest")]
    DateNewest,
    #[serde(rename = "date-oldest")]
    #[value(name = "date-oldest")]
    DateOldest,
    #[serde(rename = "title-az")]
    #[value(name = "title-az")]
    TitleAZ,
    #[serde(rename = "title-za")]
    #[value(name = "title-za")]
    TitleZA,
}

impl ComicSort {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            ComicSort::Default | ComicSort::DateNewest => "date_key DESC, id DESC",
            ComicSort::DateOldest => "date_key IS NULL, date_key ASC, id ASC",
            ComicSort::TitleAZ => "title COLLATE NOCASE ASC, id ASC",
            ComicSort::TitleZA => "title COLLATE NOCASE DESC, id DESC",
        }
    }
}

/// Filter, sort and page for listed comics. The same predicate drives both
/// the list and the count query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComicQuery {
    pub favorite: Option<bool>,
    pub text: Option<String>,
    pub sort: ComicSort,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ComicQuery {
    pub fn favorites() -> Self {
        Self {
            favorite: Some(true),
            ..Default::default()
        }
    }

    /// Substring match on title or note. Case folding covers ASCII letters
    /// only, so `"CLICHÉD"` does not match `"Clichéd"`.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }

    pub fn with_sort(mut self, sort: ComicSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// `LIKE` pattern for the text filter, with wildcards in the input escaped.
    pub(crate) fn like_pattern(&self) -> Option<String> {
        self.text.as_ref().map(|text| {
            let mut escaped = String::with_capacity(text.len() + 2);
            escaped.push('%');
            for c in text.chars() {
                if matches!(c, '%' | '_' | '\\') {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            escaped.push('%');
            escaped
        })
    }
}
