use std::path::PathBuf;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use careon_db::DbPool;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    upload_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: "ready", detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: "degraded", detail: detail.into() }
    }

    fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub storage: HealthCheck,
    pub checked_at: String,
}

/// `GET /health`. Only the database decides readiness; a missing upload
/// directory is reported but the server still takes traffic.
pub fn router(db_pool: DbPool, upload_dir: PathBuf) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, upload_dir })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let storage = storage_check(&state.upload_dir).await;
    let ready = database.is_ready();

    let payload = HealthResponse {
        status: if ready && storage.is_ready() {
            "ready"
        } else {
            "degraded"
        },
        service: HealthCheck::ready("careon-server runtime initialized"),
        database,
        storage,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pages").fetch_one(pool).await {
        Ok(count) => HealthCheck::ready(format!("{count} page(s) stored")),
        Err(error) => HealthCheck::degraded(format!("database query failed: {error}")),
    }
}

async fn storage_check(upload_dir: &std::path::Path) -> HealthCheck {
    match tokio::fs::metadata(upload_dir).await {
        Ok(metadata) if metadata.is_dir() => {
            HealthCheck::ready(format!("upload directory {} present", upload_dir.display()))
        }
        Ok(_) => HealthCheck::degraded(format!("{} is not a directory", upload_dir.display())),
        Err(error) => HealthCheck::degraded(format!(
            "upload directory {} unavailable: {error}",
            upload_dir.display()
        )),
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use careon_db::{connect_with_settings, migrations};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_database_and_storage_are_reachable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let dir = tempfile::tempdir().expect("tempdir");

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool.clone(),
            upload_dir: dir.path().to_path_buf(),
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.detail, "0 page(s) stored");
        assert_eq!(payload.storage.status, "ready");

        pool.close().await;
    }

    #[tokio::test]
    async fn missing_upload_directory_degrades_without_failing() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let dir = tempfile::tempdir().expect("tempdir");

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool.clone(),
            upload_dir: dir.path().join("missing"),
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.storage.status, "degraded");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool,
            upload_dir: std::env::temp_dir(),
        }))
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
