//! Page-builder block model.
//!
//! A page is an ordered list of [`Block`]s. Each block carries one of a closed
//! set of typed contents ([`BlockContent`]) plus optional layout
//! [`BlockSettings`]. On the wire a block is `{id, type, content, settings?}`;
//! unrecognised `type` values decode into [`BlockContent::Unknown`] so that a
//! document written by a newer editor survives a round trip.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod editor;
pub mod media;
pub mod render;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    /// `block-{unix_millis}-{9 base36 chars}`
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(format!("block-{}-{suffix}", Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Heading,
    Text,
    Image,
    Video,
    Button,
    Spacer,
    Columns,
    Hero,
    Html,
}

impl BlockKind {
    pub const ALL: [BlockKind; 9] = [
        BlockKind::Heading,
        BlockKind::Text,
        BlockKind::Image,
        BlockKind::Video,
        BlockKind::Button,
        BlockKind::Spacer,
        BlockKind::Columns,
        BlockKind::Hero,
        BlockKind::Html,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heading => "heading",
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Button => "button",
            Self::Spacer => "spacer",
            Self::Columns => "columns",
            Self::Hero => "hero",
            Self::Html => "html",
        }
    }

    /// Palette label shown in the editor sidebar.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Heading => "Heading",
            Self::Text => "Text",
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Button => "Button",
            Self::Spacer => "Spacer",
            Self::Columns => "Columns",
            Self::Hero => "Hero",
            Self::Html => "HTML",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Heading => "📝",
            Self::Text => "📄",
            Self::Image => "🖼️",
            Self::Video => "🎥",
            Self::Button => "🔘",
            Self::Spacer => "⬜",
            Self::Columns => "▥",
            Self::Hero => "🌟",
            Self::Html => "💻",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = BlockDecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim().to_ascii_lowercase())
            .ok_or_else(|| BlockDecodeError::UnknownKind(value.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum BlockDecodeError {
    #[error("unknown block type `{0}`")]
    UnknownKind(String),
    #[error("invalid `{kind}` block content: {source}")]
    InvalidContent { kind: BlockKind, source: serde_json::Error },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BlockListError {
    #[error("duplicate block id `{0}`")]
    DuplicateId(BlockId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "RawBlock")]
pub struct Block {
    pub id: BlockId,
    pub content: BlockContent,
    pub settings: Option<BlockSettings>,
}

impl Block {
    pub fn new(id: BlockId, content: BlockContent) -> Self {
        Self { id, content, settings: None }
    }

    /// A block with a fresh id and the documented default content for `kind`.
    pub fn with_defaults(kind: BlockKind) -> Self {
        Self::new(BlockId::generate(), BlockContent::default_for(kind))
    }

    pub fn with_settings(mut self, settings: BlockSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn kind(&self) -> Option<BlockKind> {
        self.content.kind()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockContent {
    Heading(HeadingContent),
    Text(TextContent),
    Image(ImageContent),
    Video(VideoContent),
    Button(ButtonContent),
    Spacer(SpacerContent),
    Columns(ColumnsContent),
    Hero(HeroContent),
    Html(HtmlContent),
    Unknown { kind: String, content: Value },
}

impl BlockContent {
    pub fn default_for(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Heading => Self::Heading(HeadingContent {
                text: "New heading".to_string(),
                level: HeadingLevel::H1,
            }),
            BlockKind::Text => Self::Text(TextContent {
                text: "Enter new text...".to_string(),
                format: Some(TextFormat::Plain),
            }),
            BlockKind::Image => Self::Image(ImageContent {
                src: String::new(),
                alt: "New image".to_string(),
                ..ImageContent::default()
            }),
            BlockKind::Video => Self::Video(VideoContent {
                src: String::new(),
                source: VideoSource::Youtube,
                ..VideoContent::default()
            }),
            BlockKind::Button => Self::Button(ButtonContent {
                text: "Button".to_string(),
                link: "#".to_string(),
                ..ButtonContent::default()
            }),
            BlockKind::Spacer => Self::Spacer(SpacerContent { height: 50 }),
            BlockKind::Columns => Self::Columns(ColumnsContent {
                columns: vec![Vec::new(), Vec::new()],
                layout: Some(ColumnsLayout::Even2),
            }),
            BlockKind::Hero => Self::Hero(HeroContent {
                title: "New hero section".to_string(),
                subtitle: Some("Enter a subtitle".to_string()),
                ..HeroContent::default()
            }),
            BlockKind::Html => {
                Self::Html(HtmlContent { html: "<p>Enter HTML here</p>".to_string() })
            }
        }
    }

    pub fn kind(&self) -> Option<BlockKind> {
        match self {
            Self::Heading(_) => Some(BlockKind::Heading),
            Self::Text(_) => Some(BlockKind::Text),
            Self::Image(_) => Some(BlockKind::Image),
            Self::Video(_) => Some(BlockKind::Video),
            Self::Button(_) => Some(BlockKind::Button),
            Self::Spacer(_) => Some(BlockKind::Spacer),
            Self::Columns(_) => Some(BlockKind::Columns),
            Self::Hero(_) => Some(BlockKind::Hero),
            Self::Html(_) => Some(BlockKind::Html),
            Self::Unknown { .. } => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Unknown { kind, .. } => kind,
            known => known.kind().map(|kind| kind.as_str()).unwrap_or_default(),
        }
    }

    fn to_value(&self) -> Value {
        let encoded = match self {
            Self::Heading(content) => serde_json::to_value(content),
            Self::Text(content) => serde_json::to_value(content),
            Self::Image(content) => serde_json::to_value(content),
            Self::Video(content) => serde_json::to_value(content),
            Self::Button(content) => serde_json::to_value(content),
            Self::Spacer(content) => serde_json::to_value(content),
            Self::Columns(content) => serde_json::to_value(content),
            Self::Hero(content) => serde_json::to_value(content),
            Self::Html(content) => serde_json::to_value(content),
            Self::Unknown { content, .. } => Ok(content.clone()),
        };
        encoded.unwrap_or(Value::Null)
    }

    fn from_parts(kind: &str, content: Value) -> Result<Self, BlockDecodeError> {
        let Ok(known) = kind.parse::<BlockKind>() else {
            return Ok(Self::Unknown { kind: kind.to_string(), content });
        };
        let invalid = |source| BlockDecodeError::InvalidContent { kind: known, source };

        Ok(match known {
            BlockKind::Heading => Self::Heading(serde_json::from_value(content).map_err(invalid)?),
            BlockKind::Text => Self::Text(serde_json::from_value(content).map_err(invalid)?),
            BlockKind::Image => Self::Image(serde_json::from_value(content).map_err(invalid)?),
            BlockKind::Video => Self::Video(serde_json::from_value(content).map_err(invalid)?),
            BlockKind::Button => Self::Button(serde_json::from_value(content).map_err(invalid)?),
            BlockKind::Spacer => Self::Spacer(serde_json::from_value(content).map_err(invalid)?),
            BlockKind::Columns => {
                Self::Columns(serde_json::from_value(content).map_err(invalid)?)
            }
            BlockKind::Hero => Self::Hero(serde_json::from_value(content).map_err(invalid)?),
            BlockKind::Html => Self::Html(serde_json::from_value(content).map_err(invalid)?),
        })
    }
}

#[derive(Serialize, Deserialize)]
struct RawBlock {
    id: BlockId,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settings: Option<BlockSettings>,
}

impl TryFrom<RawBlock> for Block {
    type Error = BlockDecodeError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        Ok(Self {
            id: raw.id,
            content: BlockContent::from_parts(&raw.kind, raw.content)?,
            settings: raw.settings,
        })
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        Self {
            id: block.id,
            kind: block.content.type_name().to_string(),
            content: block.content.to_value(),
            settings: block.settings,
        }
    }
}

/// Rejects a list in which two blocks share an id.
pub fn ensure_unique_ids(blocks: &[Block]) -> Result<(), BlockListError> {
    let mut seen = HashSet::with_capacity(blocks.len());
    for block in blocks {
        if !seen.insert(block.id.as_str()) {
            return Err(BlockListError::DuplicateId(block.id.clone()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Variant contents
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    pub const H1: HeadingLevel = HeadingLevel(1);

    pub fn new(level: u8) -> Option<Self> {
        (1..=6).contains(&level).then_some(Self(level))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("heading level must be 1..=6, got {value}"))
    }
}

impl From<HeadingLevel> for u8 {
    fn from(value: HeadingLevel) -> Self {
        value.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingContent {
    pub text: String,
    pub level: HeadingLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    Plain,
    Markdown,
    Rich,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<TextFormat>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectFit {
    Contain,
    Cover,
    Fill,
    None,
    ScaleDown,
}

impl ObjectFit {
    pub fn as_css(&self) -> &'static str {
        match self {
            Self::Contain => "contain",
            Self::Cover => "cover",
            Self::Fill => "fill",
            Self::None => "none",
            Self::ScaleDown => "scale-down",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_fit: Option<ObjectFit>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSource {
    #[default]
    Url,
    Youtube,
    Vimeo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoContent {
    pub src: String,
    #[serde(rename = "type")]
    pub source: VideoSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoplay: Option<bool>,
    #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
    pub looped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controls: Option<bool>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonVariant {
    #[default]
    Primary,
    Secondary,
    Outline,
    Ghost,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonSize {
    Sm,
    #[default]
    Md,
    Lg,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonContent {
    pub text: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<ButtonVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ButtonSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacerContent {
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnsLayout {
    #[serde(rename = "1-1")]
    Even2,
    #[serde(rename = "1-2")]
    WideRight,
    #[serde(rename = "2-1")]
    WideLeft,
    #[serde(rename = "1-1-1")]
    Even3,
    #[serde(rename = "1-2-1")]
    WideCenter,
}

impl ColumnsLayout {
    /// Relative column widths, one entry per column.
    pub fn fractions(&self) -> &'static [u8] {
        match self {
            Self::Even2 => &[1, 1],
            Self::WideRight => &[1, 2],
            Self::WideLeft => &[2, 1],
            Self::Even3 => &[1, 1, 1],
            Self::WideCenter => &[1, 2, 1],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnsContent {
    pub columns: Vec<Vec<Block>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<ColumnsLayout>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroContent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ButtonContent>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlContent {
    pub html: String,
}

// ---------------------------------------------------------------------------
// Layout settings
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spacing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<u32>,
}

impl Spacing {
    /// CSS shorthand in top/right/bottom/left order; unset sides are zero.
    pub fn to_css(&self) -> String {
        format!(
            "{}px {}px {}px {}px",
            self.top.unwrap_or(0),
            self.right.unwrap_or(0),
            self.bottom.unwrap_or(0),
            self.left.unwrap_or(0)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_css(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockWidth {
    Full,
    Wide,
    #[default]
    Narrow,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<Spacing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<Spacing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<BlockWidth>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        ensure_unique_ids, Block, BlockContent, BlockId, BlockKind, BlockListError,
        HeadingContent, HeadingLevel, Spacing,
    };

    #[test]
    fn generated_ids_follow_block_prefix_format() {
        let id = BlockId::generate();
        let parts: Vec<&str> = id.as_str().splitn(3, '-').collect();

        assert_eq!(parts[0], "block");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|ch| ch.is_ascii_digit() || ch.is_ascii_lowercase()));
    }

    #[test]
    fn block_serializes_with_type_tag_and_content() {
        let block = Block::new(
            BlockId::from("b-1"),
            BlockContent::Heading(HeadingContent {
                text: "Rent CCTV".to_string(),
                level: HeadingLevel::new(2).expect("valid level"),
            }),
        );

        let value = serde_json::to_value(&block).expect("serialize");
        assert_eq!(
            value,
            json!({"id": "b-1", "type": "heading", "content": {"text": "Rent CCTV", "level": 2}})
        );
    }

    #[test]
    fn unknown_block_type_is_preserved() {
        let raw = json!({"id": "b-9", "type": "testimonial", "content": {"quote": "great"}});
        let block: Block = serde_json::from_value(raw.clone()).expect("decode unknown");

        assert_eq!(block.kind(), None);
        assert_eq!(block.content.type_name(), "testimonial");
        assert_eq!(serde_json::to_value(&block).expect("encode"), raw);
    }

    #[test]
    fn known_type_with_wrong_content_is_rejected() {
        let raw = json!({"id": "b-2", "type": "heading", "content": {"text": "x", "level": 9}});
        let error = serde_json::from_value::<Block>(raw).expect_err("level 9 is invalid");
        assert!(error.to_string().contains("heading"));
    }

    #[test]
    fn settings_use_camel_case_keys() {
        let raw = json!({
            "id": "b-3",
            "type": "spacer",
            "content": {"height": 20},
            "settings": {"backgroundColor": "#fff", "alignment": "center", "width": "wide"}
        });
        let block: Block = serde_json::from_value(raw).expect("decode");
        let settings = block.settings.expect("settings present");

        assert_eq!(settings.background_color.as_deref(), Some("#fff"));
        assert_eq!(settings.alignment, Some(super::Alignment::Center));
    }

    #[test]
    fn every_kind_has_default_content_of_its_own_kind() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockContent::default_for(kind).kind(), Some(kind));
            assert_eq!(kind.as_str().parse::<BlockKind>().expect("parse"), kind);
        }
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let first = Block::with_defaults(BlockKind::Text);
        let mut second = Block::with_defaults(BlockKind::Spacer);
        second.id = first.id.clone();

        let error = ensure_unique_ids(&[first.clone(), second]).expect_err("duplicate");
        assert_eq!(error, BlockListError::DuplicateId(first.id));
    }

    #[test]
    fn spacing_css_defaults_missing_sides_to_zero() {
        let spacing = Spacing { top: Some(8), left: Some(4), ..Spacing::default() };
        assert_eq!(spacing.to_css(), "8px 0px 0px 4px");
    }
}
