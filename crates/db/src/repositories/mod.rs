use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use careon_core::domain::cctv_quote::{CctvQuoteRecord, QuoteListFilter, QuoteRequestId};
use careon_core::domain::page::{Page, PageUpdate};

pub mod cctv_quote;
pub mod memory;
pub mod page;

pub use cctv_quote::SqlCctvQuoteRepository;
pub use memory::{InMemoryCctvQuoteRepository, InMemoryPageRepository};
pub use page::SqlPageRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Page documents keyed by slug.
#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Page>, RepositoryError>;

    /// Like [`find_by_slug`](Self::find_by_slug) but hides drafts.
    async fn find_published_by_slug(&self, slug: &str) -> Result<Option<Page>, RepositoryError>;

    /// Inserts `page` unless its slug is taken. Returns whether a row was written.
    async fn insert_if_absent(&self, page: Page) -> Result<bool, RepositoryError>;

    /// Applies `update` to the page at `slug`. `None` when no such page exists.
    async fn update_by_slug(
        &self,
        slug: &str,
        update: &PageUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Page>, RepositoryError>;

    async fn list_slugs(&self) -> Result<Vec<String>, RepositoryError>;
}

#[async_trait]
pub trait CctvQuoteRepository: Send + Sync {
    async fn insert(&self, record: CctvQuoteRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        id: &QuoteRequestId,
    ) -> Result<Option<CctvQuoteRecord>, RepositoryError>;

    /// Newest first. Returns the page of records and the total matching count.
    async fn list(
        &self,
        filter: &QuoteListFilter,
    ) -> Result<(Vec<CctvQuoteRecord>, u64), RepositoryError>;
}

/// Fixed-width UTC text, so lexical order matches time order.
pub(crate) fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}
