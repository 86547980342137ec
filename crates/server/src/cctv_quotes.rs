//! CCTV quote intake.
//!
//! JSON Endpoints:
//! - `POST /api/cctv-quotes` : validate and store a wizard submission
//! - `GET  /api/cctv-quotes` : list stored requests (`status`, `limit`, `offset`)
//! - `GET  /api/cctv-quotes/{id}` : one stored request

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use careon_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, NoopAuditSink};
use careon_core::domain::cctv_quote::{
    CctvQuoteRecord, CctvQuoteRequest, QuoteListFilter, QuoteReceipt, QuoteRequestId,
    QuoteRequestStatus, DEFAULT_LIST_LIMIT,
};
use careon_core::errors::ApplicationError;
use careon_core::wizard::{QuoteSubmitter, SubmitError};
use careon_db::repositories::CctvQuoteRepository;
use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::pages::ApiFailure;

const MAX_LIST_LIMIT: u32 = 200;
const ACCEPTED_MESSAGE: &str = "Your quote request has been received. We will contact you shortly.";

/// Validates submissions and stores them as pending requests.
pub struct QuoteIntake {
    quotes: Arc<dyn CctvQuoteRepository>,
    audit: Arc<dyn AuditSink>,
}

impl QuoteIntake {
    pub fn new(quotes: Arc<dyn CctvQuoteRepository>) -> Self {
        Self { quotes, audit: Arc::new(NoopAuditSink) }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub async fn accept(
        &self,
        request: &CctvQuoteRequest,
        correlation_id: &str,
    ) -> Result<CctvQuoteRecord, ApplicationError> {
        let audit = AuditContext::new(None, correlation_id, "quote-intake");

        let validated = match request.validate() {
            Ok(validated) => validated,
            Err(error) => {
                self.audit.emit(
                    audit
                        .event("quote.rejected", AuditCategory::Ingress, AuditOutcome::Rejected)
                        .with_metadata("reason", error.to_string()),
                );
                return Err(error.into());
            }
        };

        // Receipt time is the server's; a client-supplied `submittedAt` is ignored.
        let submitted_at = Utc::now().trunc_subsecs(6);
        let record = validated.into_record(QuoteRequestId::generate(), submitted_at);

        self.quotes
            .insert(record.clone())
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        info!(
            event_name = "quote.accepted",
            correlation_id = %correlation_id,
            quote_request_id = %record.id,
            total_cameras = record.total_cameras,
            monthly_rental = record.monthly_rental,
            "cctv quote request stored"
        );
        self.audit.emit(
            AuditContext::new(Some(record.id.to_string()), correlation_id, "quote-intake")
                .event("quote.accepted", AuditCategory::Ingress, AuditOutcome::Success)
                .with_metadata("total_cameras", record.total_cameras.to_string()),
        );

        Ok(record)
    }

    pub async fn list(
        &self,
        filter: &QuoteListFilter,
    ) -> Result<(Vec<CctvQuoteRecord>, u64), ApplicationError> {
        self.quotes.list(filter).await.map_err(|error| ApplicationError::Persistence(error.to_string()))
    }

    pub async fn find(&self, id: &QuoteRequestId) -> Result<CctvQuoteRecord, ApplicationError> {
        self.quotes
            .find_by_id(id)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?
            .ok_or_else(|| ApplicationError::NotFound(format!("quote request `{id}`")))
    }
}

#[async_trait]
impl QuoteSubmitter for QuoteIntake {
    async fn submit(&self, request: &CctvQuoteRequest) -> Result<QuoteReceipt, SubmitError> {
        let correlation_id = Uuid::new_v4().to_string();
        match self.accept(request, &correlation_id).await {
            Ok(record) => Ok(record.receipt()),
            Err(ApplicationError::Domain(error)) => Err(SubmitError::Rejected(error.to_string())),
            Err(other) => Err(SubmitError::Unavailable(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct QuoteState {
    intake: Arc<QuoteIntake>,
}

#[derive(Debug, Serialize)]
pub struct QuoteAccepted {
    pub success: bool,
    pub message: &'static str,
    pub data: QuoteReceipt,
}

#[derive(Debug, Serialize)]
pub struct QuoteList {
    pub success: bool,
    pub data: Vec<CctvQuoteRecord>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct QuoteDetail {
    pub success: bool,
    pub data: CctvQuoteRecord,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteListQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl QuoteListQuery {
    fn into_filter(self) -> Result<QuoteListFilter, ApplicationError> {
        Ok(QuoteListFilter {
            status: QuoteRequestStatus::parse_filter(self.status.as_deref())?,
            limit: self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
            offset: self.offset.unwrap_or(0),
        })
    }
}

pub fn router(intake: Arc<QuoteIntake>) -> Router {
    Router::new()
        .route("/api/cctv-quotes", post(submit_quote).get(list_quotes))
        .route("/api/cctv-quotes/{id}", get(show_quote))
        .with_state(QuoteState { intake })
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiFailure>)>;

async fn submit_quote(
    State(state): State<QuoteState>,
    payload: Result<Json<CctvQuoteRequest>, JsonRejection>,
) -> ApiResult<QuoteAccepted> {
    let correlation_id = Uuid::new_v4().to_string();
    let Json(request) = payload.map_err(|rejection| {
        warn!(
            event_name = "quote.body_rejected",
            correlation_id = %correlation_id,
            error = %rejection,
            "malformed quote request body"
        );
        ApiFailure::response(StatusCode::BAD_REQUEST, format!("invalid request body: {rejection}"))
    })?;

    match state.intake.accept(&request, &correlation_id).await {
        Ok(record) => {
            Ok(Json(QuoteAccepted { success: true, message: ACCEPTED_MESSAGE, data: record.receipt() }))
        }
        Err(ApplicationError::Domain(error)) => {
            warn!(
                event_name = "quote.rejected",
                correlation_id = %correlation_id,
                error = %error,
                "quote request failed validation"
            );
            Err(ApiFailure::response(StatusCode::BAD_REQUEST, error.to_string()))
        }
        Err(other) => {
            error!(
                event_name = "quote.store_failed",
                correlation_id = %correlation_id,
                error = %other,
                "quote request could not be stored"
            );
            Err(ApiFailure::from_application(other, &correlation_id))
        }
    }
}

async fn list_quotes(
    State(state): State<QuoteState>,
    Query(query): Query<QuoteListQuery>,
) -> ApiResult<QuoteList> {
    let filter = query
        .into_filter()
        .map_err(|error| ApiFailure::response(StatusCode::BAD_REQUEST, error.to_string()))?;

    let (records, total) = state.intake.list(&filter).await.map_err(|error| {
        error!(event_name = "quote.list_failed", error = %error, "quote listing failed");
        ApiFailure::internal()
    })?;

    Ok(Json(QuoteList { success: true, data: records, total }))
}

async fn show_quote(
    State(state): State<QuoteState>,
    Path(id): Path<String>,
) -> ApiResult<QuoteDetail> {
    match state.intake.find(&QuoteRequestId(id)).await {
        Ok(record) => Ok(Json(QuoteDetail { success: true, data: record })),
        Err(ApplicationError::NotFound(message)) => {
            Err(ApiFailure::response(StatusCode::NOT_FOUND, message))
        }
        Err(error) => {
            error!(event_name = "quote.fetch_failed", error = %error, "quote lookup failed");
            Err(ApiFailure::internal())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use careon_core::audit::InMemoryAuditSink;
    use careon_core::domain::cctv_quote::{CctvQuoteRequest, QuoteRequestStatus};
    use careon_core::wizard::{QuoteSubmitter, SubmitError};
    use careon_db::repositories::InMemoryCctvQuoteRepository;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, QuoteIntake};

    fn complete_request() -> CctvQuoteRequest {
        CctvQuoteRequest {
            installation_place: Some("store".to_owned()),
            business_type: Some("cafe".to_owned()),
            business_size: Some("under_10".to_owned()),
            installation_locations: Some(vec!["counter".to_owned(), "entrance".to_owned()]),
            installation_quantities: Some(BTreeMap::from([
                ("counter".to_owned(), 2),
                ("entrance".to_owned(), 1),
            ])),
            calculated_price: Some(25_500),
            final_quote_method: Some("phone_consult".to_owned()),
            contact_method: Some("phone".to_owned()),
            business_name: Some("Mangwon Coffee".to_owned()),
            contact_name: Some("Kim".to_owned()),
            phone: Some("010-1234-5678".to_owned()),
            business_location: Some("Seoul Mapo-gu".to_owned()),
            agree_terms: Some(vec!["privacy_required".to_owned()]),
            ..CctvQuoteRequest::default()
        }
    }

    fn intake() -> Arc<QuoteIntake> {
        Arc::new(QuoteIntake::new(Arc::new(InMemoryCctvQuoteRepository::default())))
    }

    async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    fn post_json(body: &Value) -> Request<Body> {
        Request::post("/api/cctv-quotes")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn accepted_request_returns_receipt_with_derived_totals() {
        let app = router(intake());
        let body = serde_json::to_value(complete_request()).expect("encode");

        let (status, payload) = send(app, post_json(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["data"]["totalCameras"], json!(3));
        assert_eq!(payload["data"]["monthlyPrice"], json!(25_500));
        assert!(payload["data"]["id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn missing_field_is_named_in_a_bad_request() {
        let app = router(intake());
        let mut request = complete_request();
        request.phone = Some("   ".to_owned());
        let body = serde_json::to_value(request).expect("encode");

        let (status, payload) = send(app, post_json(&body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["success"], json!(false));
        assert!(payload["error"].as_str().is_some_and(|error| error.contains("phone")));
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request_in_the_api_shape() {
        let app = router(intake());
        let request = Request::post("/api/cctv-quotes")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");

        let (status, payload) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["success"], json!(false));
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_filters_by_status() {
        let intake = intake();
        let mut older = complete_request();
        older.business_name = Some("Older".to_owned());
        intake.accept(&older, "req-1").await.expect("accept older");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        intake.accept(&complete_request(), "req-2").await.expect("accept newer");

        let app = router(intake);
        let (status, payload) = send(
            app.clone(),
            Request::get("/api/cctv-quotes?status=ALL&limit=10").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["total"], json!(2));
        assert_eq!(payload["data"][0]["business_name"], json!("Mangwon Coffee"));
        assert_eq!(payload["data"][1]["business_name"], json!("Older"));

        let (_, contacted) = send(
            app.clone(),
            Request::get("/api/cctv-quotes?status=CONTACTED").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(contacted["total"], json!(0));

        let (status, _) = send(
            app,
            Request::get("/api/cctv-quotes?status=LOST").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn submission_time_is_stamped_by_the_server() {
        let intake = intake();
        let mut request = complete_request();
        request.submitted_at = Some(chrono::Utc::now() + chrono::Duration::days(365));

        let before = chrono::Utc::now() - chrono::Duration::seconds(1);
        let record = intake.accept(&request, "req-1").await.expect("accept");

        assert!(record.submitted_at >= before);
        assert!(record.submitted_at <= chrono::Utc::now());
    }

    #[tokio::test]
    async fn out_of_range_quantity_is_a_bad_request() {
        let app = router(intake());
        let mut body = serde_json::to_value(complete_request()).expect("encode");
        body["installationQuantities"] = json!({"counter": 4_294_967_295_u64, "hall": 1});

        let (status, payload) = send(app, post_json(&body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["error"]
            .as_str()
            .is_some_and(|error| error.contains("installationQuantities.counter")));
    }

    #[tokio::test]
    async fn stored_request_can_be_fetched_by_id() {
        let intake = intake();
        let record = intake.accept(&complete_request(), "req-1").await.expect("accept");
        let app = router(intake);

        let (status, payload) = send(
            app.clone(),
            Request::get(format!("/api/cctv-quotes/{}", record.id).as_str())
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["data"]["id"], json!(record.id.to_string()));
        assert_eq!(payload["data"]["status"], json!("PENDING"));

        let (status, _) = send(
            app,
            Request::get("/api/cctv-quotes/missing").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn intake_acts_as_a_wizard_submitter() {
        let audit = InMemoryAuditSink::default();
        let intake = QuoteIntake::new(Arc::new(InMemoryCctvQuoteRepository::default()))
            .with_audit_sink(Arc::new(audit.clone()));

        let receipt = intake.submit(&complete_request()).await.expect("submit");
        assert_eq!(receipt.total_cameras, 3);

        let (records, _) = intake.list(&Default::default()).await.expect("list");
        assert_eq!(records[0].status, QuoteRequestStatus::Pending);

        let mut incomplete = complete_request();
        incomplete.agree_terms = Some(Vec::new());
        assert!(matches!(intake.submit(&incomplete).await, Err(SubmitError::Rejected(_))));
        assert_eq!(audit.event_types(), vec!["quote.accepted".to_owned(), "quote.rejected".to_owned()]);
    }
}
