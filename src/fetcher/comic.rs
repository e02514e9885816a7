use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::app::Result;
use crate::domain::{CachedComic, ExtraParts, ListedComic};
use crate::fetcher::{ComicFetcher, HttpClient};

/// `/{id}/info.0.json` as served by the comic API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ComicDocument {
    pub num: i64,
    pub alt: String,
    pub day: String,
    pub img: String,
    pub link: String,
    pub month: String,
    pub news: String,
    pub safe_title: String,
    pub title: String,
    pub transcript: String,
    pub year: String,
    pub extra_parts: Option<ExtraPartsDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtraPartsDocument {
    pub headerextra: String,
    #[serde(rename = "imgAttr")]
    pub img_attr: String,
    pub post: String,
    pub pre: String,
}

impl ComicDocument {
    /// Date exactly as the API spells it: `"{year}-{month}-{day}"`, unpadded.
    pub fn date(&self) -> String {
        format!("{}-{}-{}", self.year, self.month, self.day)
    }

    pub fn to_cached_comic(&self) -> CachedComic {
        CachedComic {
            id: self.num,
            mouseover: self.alt.clone(),
            img_url: self.img.clone(),
            transcript: non_empty(&self.transcript),
            dynamic_html: self.extra_parts.as_ref().map(|parts| ExtraParts {
                header_extra: parts.headerextra.clone(),
                pre: parts.pre.clone(),
                post: parts.post.clone(),
                img_attr: parts.img_attr.clone(),
            }),
            news_content: non_empty(&self.news),
            link: non_empty(&self.link),
        }
    }

    pub fn to_listed_comic(&self) -> ListedComic {
        ListedComic::new(self.num, self.safe_title.clone(), self.date())
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

pub fn parse_comic(body: &[u8]) -> Result<ComicDocument> {
    Ok(serde_json::from_slice(body)?)
}

pub struct XkcdComicFetcher {
    http: HttpClient,
    base: Url,
}

impl XkcdComicFetcher {
    pub fn new(http: HttpClient, base: Url) -> Self {
        Self { http, base }
    }

    fn comic_url(&self, id: i64) -> Result<Url> {
        Ok(self.base.join(&format!("{}/info.0.json", id))?)
    }
}

#[async_trait]
impl ComicFetcher for XkcdComicFetcher {
    async fn fetch_comic(&self, id: i64) -> Result<Option<ComicDocument>> {
        let Some(body) = self.http.get(self.comic_url(id)?).await? else {
            return Ok(None);
        };

        let document = parse_comic(&body)?;
        tracing::info!("Fetched comic {} ({})", document.num, document.safe_title);
        Ok(Some(document))
    }
}
