use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::app::Result;
use crate::fetcher::{ExplanationFetcher, HttpClient};

#[derive(Debug, Deserialize)]
struct ExplanationDocument {
    parse: Option<ParsedPage>,
}

#[derive(Debug, Deserialize)]
struct ParsedPage {
    text: ParsedText,
}

#[derive(Debug, Deserialize)]
struct ParsedText {
    #[serde(rename = "*")]
    content: String,
}

/// Raw HTML of the explanation. The wiki answers unknown pages with an
/// `error` object instead of `parse`, which maps to `None`.
pub fn parse_explanation(body: &[u8]) -> Result<Option<String>> {
    let document: ExplanationDocument = serde_json::from_slice(body)?;
    Ok(document
        .parse
        .map(|page| page.text.content)
        .filter(|content| !content.trim().is_empty()))
}

pub fn explanation_url(base: &Url, page: &str) -> Result<Url> {
    let mut url = base.join("wiki/api.php")?;
    url.query_pairs_mut()
        .append_pair("action", "parse")
        .append_pair("section", "1")
        .append_pair("format", "json")
        .append_key_only("redirects")
        .append_pair("page", page);
    Ok(url)
}

pub struct ExplainWikiFetcher {
    http: HttpClient,
    base: Url,
}

impl ExplainWikiFetcher {
    pub fn new(http: HttpClient, base: Url) -> Self {
        Self { http, base }
    }
}

#[async_trait]
impl ExplanationFetcher for ExplainWikiFetcher {
    async fn fetch_explanation(&self, page: &str) -> Result<Option<String>> {
        let Some(body) = self.http.get(explanation_url(&self.base, page)?).await? else {
            return Ok(None);
        };

        let explanation = parse_explanation(&body)?;
        if explanation.is_none() {
            tracing::debug!("No explanation for {}", page);
        }
        Ok(explanation)
    }
}
