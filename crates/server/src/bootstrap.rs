use std::sync::Arc;

use axum::Router;
use careon_core::audit::{AuditEvent, AuditSink};
use careon_core::config::{AppConfig, ConfigError, LoadOptions};
use careon_db::repositories::{SqlCctvQuoteRepository, SqlPageRepository};
use careon_db::{connect_with_settings, migrations, DbPool};
use tera::Tera;
use thiserror::Error;
use tracing::info;

use crate::cctv_quotes::{self, QuoteIntake};
use crate::gateway::PageGateway;
use crate::revalidation::{EdgePurgeClient, RenderedPageCache};
use crate::uploads::{self, FsObjectStore};
use crate::{health, pages, public};

/// Every service the HTTP surface needs, wired once at startup.
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub gateway: Arc<PageGateway>,
    pub intake: Arc<QuoteIntake>,
    pub rendered_pages: Arc<RenderedPageCache>,
    pub templates: Arc<Tera>,
    pub object_store: Arc<FsObjectStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("page templates failed to load: {0}")]
    Templates(#[source] tera::Error),
    #[error("cache purge client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("upload directory could not be created: {0}")]
    Storage(#[source] std::io::Error),
}

/// Writes audit events to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = "audit.event",
            correlation_id = %event.correlation_id,
            audit_event_type = %event.event_type,
            audit_category = ?event.category,
            audit_outcome = ?event.outcome,
            actor = %event.actor,
            subject = event.subject.as_deref().unwrap_or("none"),
            metadata = ?event.metadata,
            "audit event"
        );
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let rendered_pages = Arc::new(RenderedPageCache::default());

    let mut gateway =
        PageGateway::new(Arc::new(SqlPageRepository::new(db_pool.clone())), &config.pages)
            .with_invalidator(rendered_pages.clone())
            .with_audit_sink(audit.clone());
    if let Some(purger) =
        EdgePurgeClient::from_config(&config.cache).map_err(BootstrapError::HttpClient)?
    {
        info!(
            event_name = "system.bootstrap.edge_purge_enabled",
            correlation_id = "bootstrap",
            "edge cache purging enabled"
        );
        gateway = gateway.with_invalidator(Arc::new(purger));
    }

    let intake = QuoteIntake::new(Arc::new(SqlCctvQuoteRepository::new(db_pool.clone())))
        .with_audit_sink(audit);

    let templates = public::init_templates().map_err(BootstrapError::Templates)?;

    let object_store = FsObjectStore::from_config(&config.storage);
    object_store.ensure_root().await.map_err(BootstrapError::Storage)?;

    Ok(Application {
        config,
        db_pool,
        gateway: Arc::new(gateway),
        intake: Arc::new(intake),
        rendered_pages,
        templates,
        object_store: Arc::new(object_store),
    })
}

impl Application {
    pub fn router(&self) -> Router {
        Router::new()
            .merge(health::router(self.db_pool.clone(), self.config.storage.upload_dir.clone()))
            .merge(pages::router(self.gateway.clone()))
            .merge(cctv_quotes::router(self.intake.clone()))
            .merge(uploads::router(self.object_store.clone()))
            .merge(public::router(
                self.gateway.clone(),
                self.rendered_pages.clone(),
                self.templates.clone(),
                &self.config.pages,
            ))
    }
}
