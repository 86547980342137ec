//! Inline editing of a single block.
//!
//! A [`BlockEditor`] holds the committed block and, while open, a draft copy of
//! its content. `save` validates the draft and returns the updated block for
//! the page builder; `cancel` drops the draft without producing an update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocks::media::{detect_video_source, is_acceptable_image_src, is_supported_video_url};
use crate::blocks::{Block, BlockContent};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ObjectStoreError {
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    const IMAGE_EXTENSIONS: [&'static str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "svg", "avif"];
    const VIDEO_EXTENSIONS: [&'static str; 4] = ["mp4", "webm", "ogg", "mov"];

    /// Classifies a stored file by its extension.
    pub fn from_file_name(name: &str) -> Self {
        let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some(ext) if Self::IMAGE_EXTENSIONS.contains(&ext) => Self::Image,
            Some(ext) if Self::VIDEO_EXTENSIONS.contains(&ext) => Self::Video,
            _ => Self::Other,
        }
    }
}

/// An object already held by the store, as listed in the media library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub name: String,
    pub url: String,
    pub kind: MediaKind,
    pub size: u64,
    pub updated_at: DateTime<Utc>,
}

/// Media library query: an optional kind and a case-insensitive name search.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MediaFilter {
    #[serde(default)]
    pub kind: Option<MediaKind>,
    #[serde(default)]
    pub search: Option<String>,
}

impl MediaFilter {
    pub fn matches(&self, file: &StoredFile) -> bool {
        if self.kind.is_some_and(|kind| kind != file.kind) {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|term| !term.is_empty()) {
            Some(term) => file.name.to_lowercase().contains(&term.to_lowercase()),
            None => true,
        }
    }
}

/// `1536` as `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}

/// Destination for uploaded media and the backing of the media library.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the file and returns its public URL.
    async fn put(&self, file: UploadFile) -> Result<StoredObject, ObjectStoreError>;

    /// Stored files matching the filter, newest first.
    async fn list(&self, filter: &MediaFilter) -> Result<Vec<StoredFile>, ObjectStoreError>;

    /// Removes a stored file. Returns false when nothing had that name.
    async fn delete(&self, name: &str) -> Result<bool, ObjectStoreError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("blocks can only be edited in edit mode")]
    NotEditable,
    #[error("editor is not open")]
    NotOpen,
    #[error("{0} must not be empty")]
    EmptyText(&'static str),
    #[error("`{0}` is not a valid image URL")]
    InvalidImageUrl(String),
    #[error("`{0}` is not a YouTube, Vimeo or direct video file URL")]
    InvalidVideoUrl(String),
    #[error("this block does not take a media URL")]
    NotMediaBlock,
    #[error("upload failed: {0}")]
    UploadFailed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockEditor {
    committed: Block,
    draft: Option<BlockContent>,
    error: Option<String>,
}

impl BlockEditor {
    /// Opens an editor with a draft copy of the block's content.
    pub fn open(block: &Block, is_editing: bool) -> Result<Self, EditorError> {
        if !is_editing {
            return Err(EditorError::NotEditable);
        }
        Ok(Self { committed: block.clone(), draft: Some(block.content.clone()), error: None })
    }

    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    pub fn block(&self) -> &Block {
        &self.committed
    }

    pub fn draft(&self) -> Option<&BlockContent> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut BlockContent> {
        self.draft.as_mut()
    }

    /// Inline error shown next to the media field, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Applies a typed media URL to an image or video draft.
    pub fn set_media_url(&mut self, url: &str) -> Result<(), EditorError> {
        let draft = self.draft.as_mut().ok_or(EditorError::NotOpen)?;
        let url = url.trim();
        let result = apply_media_url(draft, url);
        self.error = result.as_ref().err().map(ToString::to_string);
        result
    }

    /// Uploads a file and points the draft at the stored object. On failure the
    /// draft is left as it was and the error is kept for display.
    pub async fn upload(
        &mut self,
        store: &dyn ObjectStore,
        file: UploadFile,
    ) -> Result<(), EditorError> {
        match self.draft.as_ref() {
            None => return Err(EditorError::NotOpen),
            Some(BlockContent::Image(_) | BlockContent::Video(_)) => {}
            Some(_) => return Err(EditorError::NotMediaBlock),
        }

        match store.put(file).await {
            Ok(stored) => {
                self.error = None;
                if let Some(draft) = self.draft.as_mut() {
                    set_media_src(draft, &stored.url);
                }
                Ok(())
            }
            Err(error) => {
                let error = EditorError::UploadFailed(error.to_string());
                self.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// Validates the draft, commits it and closes the editor.
    pub fn save(&mut self) -> Result<Block, EditorError> {
        let draft = self.draft.as_ref().ok_or(EditorError::NotOpen)?;
        if let Err(error) = validate_content(draft) {
            self.error = Some(error.to_string());
            return Err(error);
        }

        if let Some(draft) = self.draft.take() {
            self.committed.content = draft;
        }
        self.error = None;
        Ok(self.committed.clone())
    }

    pub fn cancel(&mut self) {
        self.draft = None;
        self.error = None;
    }
}

fn apply_media_url(draft: &mut BlockContent, url: &str) -> Result<(), EditorError> {
    match draft {
        BlockContent::Image(_) if !is_acceptable_image_src(url) => {
            Err(EditorError::InvalidImageUrl(url.to_string()))
        }
        BlockContent::Video(_) if !is_supported_video_url(url) => {
            Err(EditorError::InvalidVideoUrl(url.to_string()))
        }
        BlockContent::Image(_) | BlockContent::Video(_) => {
            set_media_src(draft, url);
            Ok(())
        }
        _ => Err(EditorError::NotMediaBlock),
    }
}

fn set_media_src(draft: &mut BlockContent, url: &str) {
    match draft {
        BlockContent::Image(image) => image.src = url.to_string(),
        BlockContent::Video(video) => {
            video.src = url.to_string();
            video.source = detect_video_source(url);
        }
        _ => {}
    }
}

fn validate_content(content: &BlockContent) -> Result<(), EditorError> {
    match content {
        BlockContent::Heading(heading) if heading.text.trim().is_empty() => {
            Err(EditorError::EmptyText("heading text"))
        }
        BlockContent::Button(button) if button.text.trim().is_empty() => {
            Err(EditorError::EmptyText("button text"))
        }
        BlockContent::Hero(hero) if hero.title.trim().is_empty() => {
            Err(EditorError::EmptyText("hero title"))
        }
        // An empty source is allowed and renders as a placeholder.
        BlockContent::Image(image)
            if !image.src.trim().is_empty() && !is_acceptable_image_src(&image.src) =>
        {
            Err(EditorError::InvalidImageUrl(image.src.clone()))
        }
        BlockContent::Video(video)
            if !video.src.trim().is_empty() && !is_supported_video_url(&video.src) =>
        {
            Err(EditorError::InvalidVideoUrl(video.src.clone()))
        }
        _ => Ok(()),
    }
}
