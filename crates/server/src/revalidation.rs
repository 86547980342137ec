//! Invalidation targets for the page write path.
//!
//! After a page is saved the gateway asks every registered
//! [`CacheInvalidator`] to drop the public paths that show it. Two targets
//! exist: the in-process [`RenderedPageCache`] used by the public routes and an
//! optional [`EdgePurgeClient`] that forwards the paths to a CDN purge hook.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use careon_core::config::CacheConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{target} invalidation failed: {message}")]
pub struct InvalidationError {
    pub target: &'static str,
    pub message: String,
}

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn invalidate(&self, paths: &[String]) -> Result<(), InvalidationError>;
}

/// Rendered public HTML keyed by request path.
#[derive(Default)]
pub struct RenderedPageCache {
    entries: RwLock<HashMap<String, String>>,
}

impl RenderedPageCache {
    pub async fn get(&self, path: &str) -> Option<String> {
        self.entries.read().await.get(path).cloned()
    }

    pub async fn insert(&self, path: impl Into<String>, html: String) {
        self.entries.write().await.insert(path.into(), html);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheInvalidator for RenderedPageCache {
    fn name(&self) -> &'static str {
        "rendered_page_cache"
    }

    async fn invalidate(&self, paths: &[String]) -> Result<(), InvalidationError> {
        let mut entries = self.entries.write().await;
        for path in paths {
            entries.remove(path);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct PurgeRequest<'a> {
    paths: &'a [String],
}

/// Posts `{"paths": [...]}` to the configured purge hook.
pub struct EdgePurgeClient {
    client: Client,
    purge_url: String,
    token: Option<SecretString>,
}

impl EdgePurgeClient {
    pub fn new(
        purge_url: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, purge_url: purge_url.into(), token })
    }

    /// `None` when no purge URL is configured.
    pub fn from_config(config: &CacheConfig) -> Result<Option<Self>, reqwest::Error> {
        match &config.purge_url {
            Some(url) => Self::new(
                url.clone(),
                config.purge_token.clone(),
                Duration::from_secs(config.timeout_secs),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    fn failure(&self, message: String) -> InvalidationError {
        InvalidationError { target: self.name(), message }
    }
}

#[async_trait]
impl CacheInvalidator for EdgePurgeClient {
    fn name(&self) -> &'static str {
        "edge_purge"
    }

    async fn invalidate(&self, paths: &[String]) -> Result<(), InvalidationError> {
        let mut request = self.client.post(&self.purge_url).json(&PurgeRequest { paths });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| self.failure(format!("request failed: {error}")))?;

        if !response.status().is_success() {
            return Err(self.failure(format!("purge endpoint returned {}", response.status())));
        }
        Ok(())
    }
}
