use serde::{Deserialize, Serialize};

use super::ListedComic;

/// Full fetched content for a comic. Never carries user state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedComic {
    pub id: i64,
    pub mouseover: String,
    pub img_url: String,
    pub transcript: Option<String>,
    pub dynamic_html: Option<ExtraParts>,
    pub news_content: Option<String>,
    pub link: Option<String>,
}

/// Fragments for comics with interactive rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraParts {
    pub header_extra: String,
    pub pre: String,
    pub post: String,
    pub img_attr: String,
}

/// Merged view of both halves of a comic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicPair {
    pub cached: CachedComic,
    pub listed: ListedComic,
}

impl ComicPair {
    pub fn id(&self) -> i64 {
        self.listed.id
    }
}
