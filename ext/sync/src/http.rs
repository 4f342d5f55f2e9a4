//! `reqwest`-backed [`Fetcher`].

use async_trait::async_trait;

use crate::{FetchError, Fetcher};

/// Fetches remote requires and update text over HTTP(S).
///
/// Timeouts and redirects are whatever the wrapped client is configured with.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let network = |e: reqwest::Error| FetchError::Network {
            url: url.to_owned(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        let text = response.text().await.map_err(network)?;
        tracing::debug!(url, bytes = text.len(), "fetched");
        Ok(text)
    }
}
