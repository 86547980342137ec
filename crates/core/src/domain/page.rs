use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blocks::Block;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub String);

impl PageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Draft,
    #[default]
    Published,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(DomainError::InvariantViolation(format!("unknown page status `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub slug: String,
    pub title: String,
    pub blocks: Vec<Block>,
    pub status: PageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// A fresh published page.
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        blocks: Vec<Block>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PageId::generate(),
            slug: slug.into(),
            title: title.into(),
            blocks,
            status: PageStatus::Published,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PageStatus::Published
    }

    /// Public path of the page, e.g. `/landing`.
    pub fn path(&self) -> String {
        format!("/{}", self.slug)
    }
}

/// Partial update applied by slug. Absent fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Block>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PageStatus>,
}

impl PageUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.blocks.is_none() && self.status.is_none()
    }

    /// Applies the update in place, keeping `updated_at` strictly increasing.
    pub fn apply_to(&self, page: &mut Page, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            page.title = title.clone();
        }
        if let Some(blocks) = &self.blocks {
            page.blocks = blocks.clone();
        }
        if let Some(status) = self.status {
            page.status = status;
        }
        page.updated_at = next_updated_at(page.updated_at, now);
    }
}

/// `now`, or one microsecond past `previous` when the clock has not advanced.
pub fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + chrono::Duration::microseconds(1);
    now.max(floor)
}

/// Slugs are lowercase ASCII letters, digits and dashes.
pub fn validate_slug(slug: &str) -> Result<(), DomainError> {
    let valid = !slug.is_empty()
        && slug.len() <= 128
        && slug.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
        && !slug.starts_with('-');
    if valid {
        Ok(())
    } else {
        Err(DomainError::InvariantViolation(format!("invalid page slug `{slug}`")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{next_updated_at, validate_slug, Page, PageId, PageStatus, PageUpdate};
    use crate::blocks::{Block, BlockKind};

    fn page() -> Page {
        let at = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).single().expect("timestamp");
        Page {
            id: PageId("p-1".to_owned()),
            slug: "landing".to_owned(),
            title: "CareOn landing page".to_owned(),
            blocks: Vec::new(),
            status: PageStatus::Published,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn partial_update_only_touches_present_fields() {
        let mut page = page();
        let update = PageUpdate {
            blocks: Some(vec![Block::with_defaults(BlockKind::Hero)]),
            ..PageUpdate::default()
        };
        let now = page.updated_at + Duration::seconds(5);
        update.apply_to(&mut page, now);

        assert_eq!(page.title, "CareOn landing page");
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.updated_at, page.created_at + Duration::seconds(5));
    }

    #[test]
    fn updated_at_strictly_increases_when_clock_stalls() {
        let previous = page().updated_at;
        let next = next_updated_at(previous, previous - Duration::seconds(1));
        assert!(next > previous);
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!("draft".parse::<PageStatus>().expect("draft"), PageStatus::Draft);
        assert_eq!(PageStatus::Published.to_string(), "published");
        assert!("archived".parse::<PageStatus>().is_err());
    }

    #[test]
    fn slugs_are_restricted_to_path_safe_characters() {
        assert!(validate_slug("landing").is_ok());
        assert!(validate_slug("spring-promo-2025").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("Landing").is_err());
        assert!(validate_slug("../etc").is_err());
    }
}
