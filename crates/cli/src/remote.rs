//! Clients for a running careon-server.

use std::time::Duration;

use async_trait::async_trait;
use careon_core::blocks::Block;
use careon_core::builder::{BlockSink, BlockSinkError};
use careon_core::domain::cctv_quote::{CctvQuoteRequest, QuoteReceipt};
use careon_core::wizard::{QuoteSubmitter, SubmitError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Joins `path` onto the server base URL.
pub fn endpoint_url(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
}

fn client() -> Result<Client, reqwest::Error> {
    Client::builder().timeout(REQUEST_TIMEOUT).build()
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiEnvelope<T> {
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

/// Saves the builder's blocks with `PUT /api/pages/{slug}`.
pub struct HttpBlockSink {
    client: Client,
    url: Url,
}

#[derive(Serialize)]
struct BlocksUpdate<'a> {
    blocks: &'a [Block],
}

impl HttpBlockSink {
    pub fn new(base: &str, slug: &str) -> Result<Self, String> {
        let url = endpoint_url(base, &format!("api/pages/{slug}")).map_err(|error| error.to_string())?;
        Ok(Self { client: client().map_err(|error| error.to_string())?, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl BlockSink for HttpBlockSink {
    async fn save_blocks(&self, blocks: &[Block]) -> Result<(), BlockSinkError> {
        let response = self
            .client
            .put(self.url.clone())
            .json(&BlocksUpdate { blocks })
            .send()
            .await
            .map_err(|error| BlockSinkError(format!("request failed: {error}")))?;

        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let detail = response
            .json::<ApiEnvelope<serde_json::Value>>()
            .await
            .ok()
            .and_then(|envelope| envelope.error)
            .unwrap_or_else(|| status.to_string());
        Err(BlockSinkError(detail))
    }
}

/// Sends wizard submissions to `POST /api/cctv-quotes`.
pub struct HttpQuoteSubmitter {
    client: Client,
    url: Url,
}

impl HttpQuoteSubmitter {
    pub fn new(base: &str) -> Result<Self, String> {
        let url = endpoint_url(base, "api/cctv-quotes").map_err(|error| error.to_string())?;
        Ok(Self { client: client().map_err(|error| error.to_string())?, url })
    }
}

#[async_trait]
impl QuoteSubmitter for HttpQuoteSubmitter {
    async fn submit(&self, request: &CctvQuoteRequest) -> Result<QuoteReceipt, SubmitError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()
            .await
            .map_err(|error| SubmitError::Unavailable(error.to_string()))?;

        let status = response.status();
        let envelope = response
            .json::<ApiEnvelope<QuoteReceipt>>()
            .await
            .map_err(|error| SubmitError::Unavailable(format!("unreadable response: {error}")))?;

        match (status, envelope) {
            (status, ApiEnvelope { data: Some(receipt), .. }) if status.is_success() => Ok(receipt),
            (StatusCode::BAD_REQUEST, envelope) => Err(SubmitError::Rejected(
                envelope.error.unwrap_or_else(|| "request rejected".to_string()),
            )),
            (status, envelope) => Err(SubmitError::Unavailable(
                envelope.error.unwrap_or_else(|| format!("intake returned {status}")),
            )),
        }
    }
}
