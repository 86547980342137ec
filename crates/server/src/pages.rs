//! Page persistence API.
//!
//! JSON Endpoints:
//! - `GET  /api/pages/{slug}` : the published page
//! - `PUT  /api/pages/{slug}` : create if absent, then apply a partial update
//! - `POST /api/pages/{slug}` : same contract as `PUT`

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use careon_core::domain::page::{Page, PageUpdate};
use careon_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::gateway::PageGateway;

const SAVED_MESSAGE: &str = "Page saved. Changes are live immediately.";
const PAGE_NOT_FOUND: &str = "Page not found.";
const SAVE_FAILED: &str = "Page update failed.";
const SERVER_ERROR: &str = "A server error occurred.";

#[derive(Clone)]
pub struct PagesState {
    gateway: Arc<PageGateway>,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub success: bool,
    pub data: Page,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// Error body shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiFailure {
    pub success: bool,
    pub error: String,
}

impl ApiFailure {
    pub fn response(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<Self>) {
        (status, Json(Self { success: false, error: error.into() }))
    }

    pub fn internal() -> (StatusCode, Json<Self>) {
        Self::response(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR)
    }

    /// Status plus a caller-safe message; storage details stay in the log.
    pub fn from_application(
        error: ApplicationError,
        correlation_id: &str,
    ) -> (StatusCode, Json<Self>) {
        let interface = error.into_interface(correlation_id);
        let status = match interface {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::response(
            status,
            format!("{} (ref {})", interface.user_message(), interface.correlation_id()),
        )
    }
}

pub fn router(gateway: Arc<PageGateway>) -> Router {
    Router::new()
        .route("/api/pages/{slug}", get(get_page).put(save_page).post(save_page))
        .with_state(PagesState { gateway })
}

async fn get_page(
    Path(slug): Path<String>,
    State(state): State<PagesState>,
) -> Result<Json<PageResponse>, (StatusCode, Json<ApiFailure>)> {
    match state.gateway.get_page_by_slug(&slug).await {
        Ok(page) => Ok(Json(PageResponse { success: true, data: page, message: None })),
        Err(ApplicationError::NotFound(_)) => {
            Err(ApiFailure::response(StatusCode::NOT_FOUND, PAGE_NOT_FOUND))
        }
        Err(other) => {
            error!(event_name = "page.fetch_failed", slug = %slug, error = %other, "page fetch failed");
            Err(ApiFailure::internal())
        }
    }
}

async fn save_page(
    Path(slug): Path<String>,
    State(state): State<PagesState>,
    payload: Result<Json<PageUpdate>, JsonRejection>,
) -> Result<Json<PageResponse>, (StatusCode, Json<ApiFailure>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let Json(update) = payload.map_err(|rejection| {
        warn!(
            event_name = "page.body_rejected",
            correlation_id = %correlation_id,
            slug = %slug,
            error = %rejection,
            "malformed page update body"
        );
        ApiFailure::response(StatusCode::BAD_REQUEST, format!("invalid request body: {rejection}"))
    })?;

    match state.gateway.save_page(&slug, update, &correlation_id).await {
        Ok(page) => {
            Ok(Json(PageResponse { success: true, data: page, message: Some(SAVED_MESSAGE) }))
        }
        Err(error @ (ApplicationError::Domain(_) | ApplicationError::NotFound(_))) => {
            warn!(
                event_name = "page.save_rejected",
                correlation_id = %correlation_id,
                slug = %slug,
                error = %error,
                "page update failed"
            );
            Err(ApiFailure::response(StatusCode::BAD_REQUEST, format!("{SAVE_FAILED} {error}")))
        }
        Err(other) => {
            error!(
                event_name = "page.save_failed",
                correlation_id = %correlation_id,
                slug = %slug,
                error = %other,
                "page could not be stored"
            );
            Err(ApiFailure::from_application(other, &correlation_id))
        }
    }
}
