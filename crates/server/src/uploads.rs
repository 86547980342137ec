//! Media uploads for image and video blocks.
//!
//! Endpoints:
//! - `POST   /api/uploads/{file_name}` : raw body, `content-type` must be `image/*` or `video/*`
//! - `GET    /api/uploads`             : media library listing (`?kind=image|video&search=`)
//! - `DELETE /api/uploads/{file_name}` : removes a stored file
//! - `GET    /uploads/...`             : stored files, served from the upload directory

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use careon_core::blocks::editor::{
    MediaFilter, MediaKind, ObjectStore, ObjectStoreError, StoredFile, StoredObject, UploadFile,
};
use chrono::{DateTime, Utc};
use careon_core::config::StorageConfig;
use serde::Serialize;
use tower_http::services::ServeDir;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pages::ApiFailure;

/// Writes uploads under a local directory and hands back their public URL.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: String,
    max_bytes: usize,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.upload_dir.clone(), config.public_base_url.clone(), config.max_upload_bytes)
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    fn public_url(&self, stored_name: &str) -> String {
        format!("{}/{}", self.public_base_url, stored_name)
    }
}

fn unavailable(error: std::io::Error) -> ObjectStoreError {
    ObjectStoreError::Unavailable(error.to_string())
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, file: UploadFile) -> Result<StoredObject, ObjectStoreError> {
        let content_type = file.content_type.as_deref().unwrap_or_default();
        if !is_media_type(content_type) {
            return Err(ObjectStoreError::Rejected(format!(
                "unsupported content type `{content_type}`; expected image/* or video/*"
            )));
        }
        if file.bytes.is_empty() {
            return Err(ObjectStoreError::Rejected("file is empty".to_string()));
        }
        if file.bytes.len() > self.max_bytes {
            return Err(ObjectStoreError::Rejected(format!(
                "file is {} bytes; the limit is {}",
                file.bytes.len(),
                self.max_bytes
            )));
        }

        let stored_name = format!("{}-{}", Uuid::new_v4().simple(), sanitize_file_name(&file.file_name));
        self.ensure_root().await.map_err(unavailable)?;
        tokio::fs::write(self.root.join(&stored_name), &file.bytes).await.map_err(unavailable)?;

        Ok(StoredObject { url: self.public_url(&stored_name) })
    }

    async fn list(&self, filter: &MediaFilter) -> Result<Vec<StoredFile>, ObjectStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(unavailable(error)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await.map_err(unavailable)?;
            if !metadata.is_file() {
                continue;
            }
            let updated_at =
                metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
            let file = StoredFile {
                url: self.public_url(&name),
                kind: MediaKind::from_file_name(&name),
                size: metadata.len(),
                updated_at,
                name,
            };
            if filter.matches(&file) {
                files.push(file);
            }
        }

        files.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.name.cmp(&b.name)));
        Ok(files)
    }

    async fn delete(&self, name: &str) -> Result<bool, ObjectStoreError> {
        if name.is_empty() || sanitize_file_name(name) != name {
            return Err(ObjectStoreError::Rejected(format!("`{name}` is not a stored file name")));
        }
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(unavailable(error)),
        }
    }
}

fn is_media_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.split_once('/') {
        Some(("image", subtype)) | Some(("video", subtype)) => !subtype.is_empty(),
        _ => false,
    }
}

/// Keeps ASCII letters, digits, `.`, `-` and `_`; everything else becomes `-`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') { ch } else { '-' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadAccepted {
    pub success: bool,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MediaLibrary {
    pub success: bool,
    pub data: Vec<StoredFile>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadDeleted {
    pub success: bool,
    pub name: String,
}

pub fn router(store: Arc<FsObjectStore>) -> Router {
    let files = ServeDir::new(store.root());
    // Leave headroom over the store's own limit so oversize files get a JSON error.
    let body_limit = store.max_bytes().saturating_add(1);

    Router::new()
        .route("/api/uploads", get(list_uploads))
        .route("/api/uploads/{file_name}", post(upload).delete(delete_upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(store)
        .nest_service("/uploads", files)
}

async fn upload(
    State(store): State<Arc<FsObjectStore>>,
    Path(file_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadAccepted>), (StatusCode, Json<ApiFailure>)> {
    let content_type =
        headers.get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()).map(str::to_owned);
    let size = body.len();

    let file = UploadFile { file_name, content_type, bytes: body.to_vec() };
    match store.put(file).await {
        Ok(stored) => {
            info!(event_name = "upload.stored", url = %stored.url, size, "upload stored");
            Ok((StatusCode::CREATED, Json(UploadAccepted { success: true, url: stored.url })))
        }
        Err(ObjectStoreError::Rejected(reason)) => {
            warn!(event_name = "upload.rejected", reason = %reason, size, "upload rejected");
            Err(ApiFailure::response(StatusCode::BAD_REQUEST, reason))
        }
        Err(ObjectStoreError::Unavailable(reason)) => {
            warn!(event_name = "upload.failed", reason = %reason, "upload storage failed");
            Err(ApiFailure::internal())
        }
    }
}

async fn list_uploads(
    State(store): State<Arc<FsObjectStore>>,
    Query(filter): Query<MediaFilter>,
) -> Result<Json<MediaLibrary>, (StatusCode, Json<ApiFailure>)> {
    match store.list(&filter).await {
        Ok(data) => Ok(Json(MediaLibrary { success: true, data })),
        Err(error) => {
            warn!(event_name = "upload.list_failed", error = %error, "media library listing failed");
            Err(ApiFailure::internal())
        }
    }
}

async fn delete_upload(
    State(store): State<Arc<FsObjectStore>>,
    Path(file_name): Path<String>,
) -> Result<Json<UploadDeleted>, (StatusCode, Json<ApiFailure>)> {
    match store.delete(&file_name).await {
        Ok(true) => {
            info!(event_name = "upload.deleted", name = %file_name, "upload deleted");
            Ok(Json(UploadDeleted { success: true, name: file_name }))
        }
        Ok(false) => Err(ApiFailure::response(
            StatusCode::NOT_FOUND,
            format!("no stored file named `{file_name}`"),
        )),
        Err(ObjectStoreError::Rejected(reason)) => {
            Err(ApiFailure::response(StatusCode::BAD_REQUEST, reason))
        }
        Err(ObjectStoreError::Unavailable(reason)) => {
            warn!(event_name = "upload.delete_failed", reason = %reason, "upload delete failed");
            Err(ApiFailure::internal())
        }
    }
}
