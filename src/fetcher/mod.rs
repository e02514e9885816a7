pub mod archive;
pub mod comic;
pub mod explanation;
pub mod http;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::ArchiveEntry;

pub use archive::XkcdArchiveFetcher;
pub use comic::{ComicDocument, XkcdComicFetcher};
pub use explanation::ExplainWikiFetcher;
pub use http::HttpClient;

// Every fetcher separates three outcomes: `Ok(Some(..))` data, `Ok(None)` the
// remote had nothing, `Err(..)` the request or its decoding failed.

#[async_trait]
pub trait ComicFetcher {
    async fn fetch_comic(&self, id: i64) -> Result<Option<ComicDocument>>;
}

#[async_trait]
pub trait ArchiveFetcher {
    /// The full archive index in page order. Empty when the page had no listing.
    async fn fetch_archive(&self) -> Result<Vec<ArchiveEntry>>;
}

#[async_trait]
pub trait ExplanationFetcher {
    async fn fetch_explanation(&self, page: &str) -> Result<Option<String>>;
}
