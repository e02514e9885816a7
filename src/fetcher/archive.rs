use async_trait::async_trait;
use html_escape::decode_html_entities;
use regex::Regex;
use url::Url;

use crate::app::{ComicError, Result};
use crate::domain::ArchiveEntry;
use crate::fetcher::{ArchiveFetcher, HttpClient};

/// Scans the archive page's listing container for comic anchors:
/// `<a href="/500/" title="2008-12-3">Election</a>`.
pub struct ArchiveParser {
    container: Regex,
    anchor: Regex,
    attribute: Regex,
}

impl ArchiveParser {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| ComicError::ArchiveParse(e.to_string()))
        };

        Ok(Self {
            container: compile(r#"<div[^>]*\bid\s*=\s*"middleContainer"[^>]*>"#)?,
            anchor: compile(r"(?s)<a\s([^>]*)>(.*?)</a>")?,
            attribute: compile(r#"([A-Za-z-]+)\s*=\s*"([^"]*)""#)?,
        })
    }

    /// Entries in page order. A page without the container yields nothing;
    /// an anchor whose href is not a comic id is an error.
    pub fn parse(&self, html: &str) -> Result<Vec<ArchiveEntry>> {
        let Some(start) = self.container.find(html) else {
            tracing::warn!("Archive page has no listing container");
            return Ok(Vec::new());
        };
        let rest = &html[start.end()..];
        let listing = rest.find("</div>").map_or(rest, |end| &rest[..end]);

        let mut entries = Vec::new();
        for anchor in self.anchor.captures_iter(listing) {
            let mut href = None;
            let mut date = String::new();
            for attr in self.attribute.captures_iter(&anchor[1]) {
                match &attr[1] {
                    "href" => href = Some(attr[2].to_string()),
                    "title" => date = decode_html_entities(&attr[2]).trim().to_string(),
                    _ => {}
                }
            }

            let href = href.ok_or_else(|| {
                ComicError::ArchiveParse(format!("anchor without href: {}", &anchor[0]))
            })?;
            let id = href
                .trim()
                .trim_matches('/')
                .parse::<i64>()
                .map_err(|e| ComicError::ArchiveParse(format!("invalid comic id in {:?}: {}", href, e)))?;

            entries.push(ArchiveEntry {
                id,
                date,
                title: decode_html_entities(anchor[2].trim()).to_string(),
            });
        }

        Ok(entries)
    }
}

pub struct XkcdArchiveFetcher {
    http: HttpClient,
    base: Url,
    parser: ArchiveParser,
}

impl XkcdArchiveFetcher {
    pub fn new(http: HttpClient, base: Url) -> Result<Self> {
        Ok(Self {
            http,
            base,
            parser: ArchiveParser::new()?,
        })
    }
}

#[async_trait]
impl ArchiveFetcher for XkcdArchiveFetcher {
    async fn fetch_archive(&self) -> Result<Vec<ArchiveEntry>> {
        let url = self.base.join("archive/")?;
        let Some(body) = self.http.get(url).await? else {
            return Ok(Vec::new());
        };

        let html = String::from_utf8_lossy(&body);
        let entries = self.parser.parse(&html)?;
        tracing::info!("Parsed {} archive entries", entries.len());
        Ok(entries)
    }
}
