use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::RwLock;

use careon_core::domain::cctv_quote::{CctvQuoteRecord, QuoteListFilter, QuoteRequestId};
use careon_core::domain::page::{Page, PageUpdate};

use super::{CctvQuoteRepository, PageRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryPageRepository {
    pages: RwLock<HashMap<String, Page>>,
}

#[async_trait::async_trait]
impl PageRepository for InMemoryPageRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Page>, RepositoryError> {
        let pages = self.pages.read().await;
        Ok(pages.get(slug).cloned())
    }

    async fn find_published_by_slug(&self, slug: &str) -> Result<Option<Page>, RepositoryError> {
        let pages = self.pages.read().await;
        Ok(pages.get(slug).filter(|page| page.is_published()).cloned())
    }

    async fn insert_if_absent(&self, page: Page) -> Result<bool, RepositoryError> {
        let mut pages = self.pages.write().await;
        if pages.contains_key(&page.slug) {
            return Ok(false);
        }
        pages.insert(page.slug.clone(), page);
        Ok(true)
    }

    async fn update_by_slug(
        &self,
        slug: &str,
        update: &PageUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Page>, RepositoryError> {
        let mut pages = self.pages.write().await;
        Ok(pages.get_mut(slug).map(|page| {
            update.apply_to(page, now.trunc_subsecs(6));
            page.clone()
        }))
    }

    async fn list_slugs(&self) -> Result<Vec<String>, RepositoryError> {
        let pages = self.pages.read().await;
        let mut slugs: Vec<String> = pages.keys().cloned().collect();
        slugs.sort();
        Ok(slugs)
    }
}

#[derive(Default)]
pub struct InMemoryCctvQuoteRepository {
    records: RwLock<Vec<CctvQuoteRecord>>,
}

#[async_trait::async_trait]
impl CctvQuoteRepository for InMemoryCctvQuoteRepository {
    async fn insert(&self, record: CctvQuoteRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &QuoteRequestId,
    ) -> Result<Option<CctvQuoteRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|record| &record.id == id).cloned())
    }

    async fn list(
        &self,
        filter: &QuoteListFilter,
    ) -> Result<(Vec<CctvQuoteRecord>, u64), RepositoryError> {
        let records = self.records.read().await;
        let mut matching: Vec<&CctvQuoteRecord> = records
            .iter()
            .filter(|record| filter.status.map_or(true, |status| record.status == status))
            .collect();
        matching.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then_with(|| b.id.0.cmp(&a.id.0)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}
