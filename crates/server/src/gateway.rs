//! Page persistence gateway.
//!
//! Reads go straight to the repository. Writes create the page when no
//! published page exists for the slug, apply the partial update and then
//! invalidate the slug's public path and the alias route on every registered
//! [`CacheInvalidator`]. Invalidation is best-effort: failures are logged and
//! never fail the write.

use std::sync::Arc;

use careon_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, NoopAuditSink};
use careon_core::config::PagesConfig;
use careon_core::blocks::{ensure_unique_ids, Block};
use careon_core::domain::page::{validate_slug, Page, PageUpdate};
use careon_core::errors::{ApplicationError, DomainError};
use careon_db::repositories::{PageRepository, RepositoryError};
use chrono::Utc;
use tracing::{info, warn};

use crate::revalidation::CacheInvalidator;

const ACTOR: &str = "page-gateway";

pub struct PageGateway {
    pages: Arc<dyn PageRepository>,
    invalidators: Vec<Arc<dyn CacheInvalidator>>,
    audit: Arc<dyn AuditSink>,
    alias_route: String,
    default_title: String,
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

/// Blocks are addressed by id, so a stored list must not repeat one.
fn check_blocks(blocks: &[Block]) -> Result<(), ApplicationError> {
    ensure_unique_ids(blocks)
        .map_err(|error| ApplicationError::Domain(DomainError::InvariantViolation(error.to_string())))
}

impl PageGateway {
    pub fn new(pages: Arc<dyn PageRepository>, settings: &PagesConfig) -> Self {
        Self {
            pages,
            invalidators: Vec::new(),
            audit: Arc::new(NoopAuditSink),
            alias_route: settings.alias_route.clone(),
            default_title: settings.default_title.clone(),
        }
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidators.push(invalidator);
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// The published page at `slug`.
    pub async fn get_page_by_slug(&self, slug: &str) -> Result<Page, ApplicationError> {
        self.pages
            .find_published_by_slug(slug)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound(format!("page `{slug}`")))
    }

    /// The page at `slug` whatever its status, for editing and export.
    pub async fn get_page_for_editing(&self, slug: &str) -> Result<Page, ApplicationError> {
        validate_slug(slug)?;
        self.pages
            .find_by_slug(slug)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound(format!("page `{slug}`")))
    }

    /// Every stored slug, drafts included.
    pub async fn list_slugs(&self) -> Result<Vec<String>, ApplicationError> {
        self.pages.list_slugs().await.map_err(persistence)
    }

    /// Partial update of an existing page. Fails with not-found when no page
    /// exists for the slug.
    pub async fn update_page_by_slug(
        &self,
        slug: &str,
        update: &PageUpdate,
    ) -> Result<Page, ApplicationError> {
        if let Some(blocks) = update.blocks.as_deref() {
            check_blocks(blocks)?;
        }
        self.pages
            .update_by_slug(slug, update, Utc::now())
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound(format!("page `{slug}`")))
    }

    /// Inserts a published page unless the slug is already taken.
    pub async fn create_page_if_not_exists(
        &self,
        slug: &str,
        title: &str,
        blocks: Vec<Block>,
    ) -> Result<bool, ApplicationError> {
        validate_slug(slug)?;
        check_blocks(&blocks)?;
        self.pages
            .insert_if_absent(Page::new(slug, title, blocks, Utc::now()))
            .await
            .map_err(persistence)
    }

    /// The write path behind `PUT /api/pages/{slug}`.
    pub async fn save_page(
        &self,
        slug: &str,
        update: PageUpdate,
        correlation_id: &str,
    ) -> Result<Page, ApplicationError> {
        validate_slug(slug)?;
        let audit = AuditContext::new(Some(slug.to_owned()), correlation_id, ACTOR);

        let existing = self.pages.find_published_by_slug(slug).await.map_err(persistence)?;
        if existing.is_none() {
            let title = update.title.clone().unwrap_or_else(|| self.default_title.clone());
            let blocks = update.blocks.clone().unwrap_or_default();
            let created = self.create_page_if_not_exists(slug, &title, blocks).await?;
            if created {
                info!(
                    event_name = "page.created",
                    correlation_id = %correlation_id,
                    slug = %slug,
                    "page created on first save"
                );
                self.audit.emit(audit.event(
                    "page.created",
                    AuditCategory::Persistence,
                    AuditOutcome::Success,
                ));
            }
        }

        let page = match self.update_page_by_slug(slug, &update).await {
            Ok(page) => page,
            Err(error) => {
                self.audit.emit(
                    audit
                        .event("page.update_failed", AuditCategory::Persistence, AuditOutcome::Failed)
                        .with_metadata("error", error.to_string()),
                );
                return Err(error);
            }
        };

        info!(
            event_name = "page.saved",
            correlation_id = %correlation_id,
            slug = %slug,
            block_count = page.blocks.len(),
            "page saved"
        );
        self.audit.emit(
            audit
                .event("page.updated", AuditCategory::Persistence, AuditOutcome::Success)
                .with_metadata("block_count", page.blocks.len().to_string()),
        );

        self.invalidate(slug, &audit).await;
        Ok(page)
    }

    /// `/{slug}` and the alias route, without duplicates.
    pub fn invalidation_paths(&self, slug: &str) -> Vec<String> {
        let mut paths = vec![format!("/{slug}")];
        if !paths.contains(&self.alias_route) {
            paths.push(self.alias_route.clone());
        }
        paths
    }

    async fn invalidate(&self, slug: &str, audit: &AuditContext) {
        let paths = self.invalidation_paths(slug);
        for invalidator in &self.invalidators {
            match invalidator.invalidate(&paths).await {
                Ok(()) => {
                    info!(
                        event_name = "page.cache.invalidated",
                        correlation_id = %audit.correlation_id,
                        slug = %slug,
                        target = invalidator.name(),
                        paths = ?paths,
                        "cache invalidated"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "page.cache.invalidation_failed",
                        correlation_id = %audit.correlation_id,
                        slug = %slug,
                        target = invalidator.name(),
                        error = %error,
                        "cache invalidation failed; the write itself succeeded"
                    );
                    self.audit.emit(
                        audit
                            .event("page.invalidation_failed", AuditCategory::Cache, AuditOutcome::Failed)
                            .with_metadata("target", invalidator.name())
                            .with_metadata("error", error.message.clone()),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use careon_core::audit::InMemoryAuditSink;
    use careon_core::blocks::{Block, BlockKind};
    use careon_core::config::AppConfig;
    use careon_core::domain::page::{PageStatus, PageUpdate};
    use careon_core::errors::{ApplicationError, DomainError};
    use careon_db::repositories::{InMemoryPageRepository, PageRepository};

    use super::PageGateway;
    use crate::revalidation::{CacheInvalidator, InvalidationError, RenderedPageCache};

    #[derive(Default)]
    struct RecordingInvalidator {
        calls: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl CacheInvalidator for RecordingInvalidator {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn invalidate(&self, paths: &[String]) -> Result<(), InvalidationError> {
            self.calls.lock().expect("lock").push(paths.to_vec());
            if self.fail {
                return Err(InvalidationError { target: "recording", message: "edge down".into() });
            }
            Ok(())
        }
    }

    fn gateway(repo: Arc<InMemoryPageRepository>) -> PageGateway {
        PageGateway::new(repo, &AppConfig::default().pages)
    }

    fn titled(title: &str) -> PageUpdate {
        PageUpdate { title: Some(title.to_owned()), ..PageUpdate::default() }
    }

    #[tokio::test]
    async fn save_creates_a_missing_page_and_get_returns_it() {
        let gateway = gateway(Arc::new(InMemoryPageRepository::default()));
        let update = PageUpdate {
            title: Some("Spring promo".to_owned()),
            blocks: Some(vec![Block::with_defaults(BlockKind::Hero)]),
            status: None,
        };

        let saved = gateway.save_page("new-slug", update, "req-1").await.expect("save");
        let fetched = gateway.get_page_by_slug("new-slug").await.expect("get");

        assert_eq!(saved, fetched);
        assert_eq!(saved.title, "Spring promo");
        assert_eq!(saved.status, PageStatus::Published);
    }

    #[tokio::test]
    async fn created_page_defaults_its_title() {
        let gateway = gateway(Arc::new(InMemoryPageRepository::default()));
        let update =
            PageUpdate { blocks: Some(vec![Block::with_defaults(BlockKind::Text)]), ..PageUpdate::default() };

        let saved = gateway.save_page("landing", update, "req-1").await.expect("save");
        assert_eq!(saved.title, "CareOn landing page");
    }

    #[tokio::test]
    async fn sequential_saves_keep_the_last_write_and_advance_updated_at() {
        let gateway = gateway(Arc::new(InMemoryPageRepository::default()));

        let first = gateway.save_page("landing", titled("First"), "req-1").await.expect("first");
        let second = gateway.save_page("landing", titled("Second"), "req-2").await.expect("second");

        assert_eq!(second.title, "Second");
        assert_eq!(second.id, first.id);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(gateway.get_page_by_slug("landing").await.expect("get").title, "Second");
    }

    #[tokio::test]
    async fn save_invalidates_slug_and_alias_route() {
        let recorder = Arc::new(RecordingInvalidator::default());
        let gateway = gateway(Arc::new(InMemoryPageRepository::default()))
            .with_invalidator(recorder.clone());

        gateway.save_page("promo", titled("Promo"), "req-1").await.expect("save");

        let calls = recorder.calls.lock().expect("lock").clone();
        assert_eq!(calls, vec![vec!["/promo".to_owned(), "/landing".to_owned()]]);
        assert_eq!(gateway.invalidation_paths("landing"), vec!["/landing".to_owned()]);
    }

    #[tokio::test]
    async fn invalidation_failure_does_not_fail_the_write() {
        let failing = Arc::new(RecordingInvalidator { fail: true, ..RecordingInvalidator::default() });
        let cache = Arc::new(RenderedPageCache::default());
        cache.insert("/landing", "stale".to_owned()).await;
        let audit = InMemoryAuditSink::default();
        let gateway = gateway(Arc::new(InMemoryPageRepository::default()))
            .with_invalidator(failing)
            .with_invalidator(cache.clone())
            .with_audit_sink(Arc::new(audit.clone()));

        let saved = gateway.save_page("landing", titled("Fresh"), "req-9").await;

        assert!(saved.is_ok());
        assert!(cache.get("/landing").await.is_none(), "later invalidators still run");
        assert!(audit.event_types().contains(&"page.invalidation_failed".to_owned()));
        assert!(audit.event_types().contains(&"page.created".to_owned()));
    }

    #[tokio::test]
    async fn drafts_are_not_served_but_can_be_saved_again() {
        let repo = Arc::new(InMemoryPageRepository::default());
        let gateway = gateway(repo.clone());
        let draft = PageUpdate { status: Some(PageStatus::Draft), ..titled("Hidden") };
        gateway.save_page("landing", draft, "req-1").await.expect("save draft");

        assert!(matches!(
            gateway.get_page_by_slug("landing").await,
            Err(ApplicationError::NotFound(_))
        ));

        let republished = PageUpdate { status: Some(PageStatus::Published), ..titled("Back") };
        let page = gateway.save_page("landing", republished, "req-2").await.expect("save");
        assert_eq!(page.title, "Back");
        assert_eq!(repo.list_slugs().await.expect("slugs").len(), 1);
    }

    #[tokio::test]
    async fn invalid_slug_is_a_domain_error() {
        let gateway = gateway(Arc::new(InMemoryPageRepository::default()));
        let result = gateway.save_page("../etc", PageUpdate::default(), "req-1").await;

        assert!(matches!(result, Err(ApplicationError::Domain(DomainError::InvariantViolation(_)))));
    }

    #[tokio::test]
    async fn repeated_block_ids_are_rejected_before_anything_is_stored() {
        let repo = Arc::new(InMemoryPageRepository::default());
        let gateway = gateway(repo.clone());
        let twin = Block::with_defaults(BlockKind::Spacer);
        let update = PageUpdate {
            blocks: Some(vec![twin.clone(), twin]),
            ..PageUpdate::default()
        };

        let result = gateway.save_page("promo", update, "req-1").await;

        assert!(matches!(result, Err(ApplicationError::Domain(DomainError::InvariantViolation(_)))));
        assert!(repo.list_slugs().await.expect("slugs").is_empty());
    }

    #[tokio::test]
    async fn editing_reads_drafts_and_lists_every_slug() {
        let gateway = gateway(Arc::new(InMemoryPageRepository::default()));
        let draft = PageUpdate { status: Some(PageStatus::Draft), ..titled("Hidden") };
        gateway.save_page("spring", draft, "req-1").await.expect("save draft");
        gateway.save_page("landing", titled("Live"), "req-2").await.expect("save live");

        assert_eq!(gateway.get_page_for_editing("spring").await.expect("draft").title, "Hidden");
        assert!(matches!(
            gateway.get_page_for_editing("autumn").await,
            Err(ApplicationError::NotFound(_))
        ));
        let mut slugs = gateway.list_slugs().await.expect("slugs");
        slugs.sort();
        assert_eq!(slugs, vec!["landing".to_owned(), "spring".to_owned()]);
    }

    #[tokio::test]
    async fn update_of_missing_page_is_not_found() {
        let gateway = gateway(Arc::new(InMemoryPageRepository::default()));
        let result = gateway.update_page_by_slug("missing", &titled("x")).await;

        assert!(matches!(result, Err(ApplicationError::NotFound(_))));
    }
}
