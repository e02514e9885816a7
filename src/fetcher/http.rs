use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;

use crate::app::Result;
use crate::config::RemoteConfig;

/// Shared reqwest client for every remote endpoint.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }

    /// GET `url`. A 404 or an empty body is `Ok(None)`; any other non-2xx
    /// status is an error.
    pub async fn get(&self, url: Url) -> Result<Option<Vec<u8>>> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("{} not found", url);
            return Ok(None);
        }

        response.error_for_status_ref()?;

        let body = response.bytes().await?;
        if body.is_empty() {
            tracing::warn!("Empty body from {}", url);
            return Ok(None);
        }

        Ok(Some(body.to_vec()))
    }
}

/// Parse a configured base URL, making sure relative joins stay beneath it.
pub fn base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
