use chrono::{DateTime, SubsecRound, Utc};
use sqlx::Row;

use careon_core::domain::page::{Page, PageId, PageStatus, PageUpdate};

use super::{decode_timestamp, encode_timestamp, PageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPageRepository {
    pool: DbPool,
}

impl SqlPageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PAGE_COLUMNS: &str = "id, slug, title, blocks, status, created_at, updated_at";

fn row_to_page(row: &sqlx::sqlite::SqliteRow) -> Result<Page, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let slug: String = row.try_get("slug").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let blocks_json: String =
        row.try_get("blocks").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let blocks = serde_json::from_str(&blocks_json)
        .map_err(|e| RepositoryError::Decode(format!("blocks of page `{slug}`: {e}")))?;
    let status = status_str
        .parse::<PageStatus>()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Page {
        id: PageId(id),
        slug,
        title,
        blocks,
        status,
        created_at: decode_timestamp("created_at", &created_at_str)?,
        updated_at: decode_timestamp("updated_at", &updated_at_str)?,
    })
}

fn encode_blocks(page: &Page) -> Result<String, RepositoryError> {
    serde_json::to_string(&page.blocks)
        .map_err(|e| RepositoryError::Decode(format!("blocks of page `{}`: {e}", page.slug)))
}

#[async_trait::async_trait]
impl PageRepository for SqlPageRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Page>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE slug = ?"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_page).transpose()
    }

    async fn find_published_by_slug(&self, slug: &str) -> Result<Option<Page>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE slug = ? AND status = 'published'"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_page).transpose()
    }

    async fn insert_if_absent(&self, page: Page) -> Result<bool, RepositoryError> {
        let blocks_json = encode_blocks(&page)?;

        let result = sqlx::query(
            "INSERT INTO pages (id, slug, title, blocks, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(slug) DO NOTHING",
        )
        .bind(&page.id.0)
        .bind(&page.slug)
        .bind(&page.title)
        .bind(&blocks_json)
        .bind(page.status.as_str())
        .bind(encode_timestamp(page.created_at))
        .bind(encode_timestamp(page.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_by_slug(
        &self,
        slug: &str,
        update: &PageUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Page>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE slug = ?"))
            .bind(slug)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut page = row_to_page(&row)?;
        // Stored timestamps carry microseconds; keep the returned page identical to a re-read.
        update.apply_to(&mut page, now.trunc_subsecs(6));
        let blocks_json = encode_blocks(&page)?;

        sqlx::query(
            "UPDATE pages SET title = ?, blocks = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&page.title)
        .bind(&blocks_json)
        .bind(page.status.as_str())
        .bind(encode_timestamp(page.updated_at))
        .bind(&page.id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(page))
    }

    async fn list_slugs(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT slug FROM pages ORDER BY slug")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get("slug").map_err(|e| RepositoryError::Decode(e.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, SubsecRound, Utc};

    use careon_core::blocks::{Block, BlockContent, BlockKind};
    use careon_core::domain::page::{Page, PageStatus, PageUpdate};

    use super::SqlPageRepository;
    use crate::repositories::PageRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlPageRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlPageRepository::new(pool)
    }

    fn landing() -> Page {
        Page::new(
            "landing",
            "CareOn landing",
            vec![Block::with_defaults(BlockKind::Hero), Block::with_defaults(BlockKind::Text)],
            Utc::now().trunc_subsecs(6),
        )
    }

    #[tokio::test]
    async fn insert_then_find_returns_the_same_document() {
        let repo = setup().await;
        let page = landing();

        assert!(repo.insert_if_absent(page.clone()).await.expect("insert"));
        let found = repo.find_by_slug("landing").await.expect("find").expect("exists");

        assert_eq!(found, page);
        assert_eq!(found.blocks[0].kind(), Some(BlockKind::Hero));
    }

    #[tokio::test]
    async fn insert_if_absent_keeps_the_existing_page() {
        let repo = setup().await;
        let page = landing();
        repo.insert_if_absent(page.clone()).await.expect("insert");

        let mut other = landing();
        other.title = "Replacement".to_owned();
        assert!(!repo.insert_if_absent(other).await.expect("second insert"));

        let found = repo.find_by_slug("landing").await.expect("find").expect("exists");
        assert_eq!(found.title, "CareOn landing");
    }

    #[tokio::test]
    async fn update_applies_partial_fields_and_advances_updated_at() {
        let repo = setup().await;
        let page = landing();
        repo.insert_if_absent(page.clone()).await.expect("insert");

        let update = PageUpdate { title: Some("Spring promo".to_owned()), ..PageUpdate::default() };
        // A stalled clock must still move updated_at forward.
        let updated = repo
            .update_by_slug("landing", &update, page.updated_at - Duration::seconds(10))
            .await
            .expect("update")
            .expect("exists");

        assert_eq!(updated.title, "Spring promo");
        assert_eq!(updated.blocks.len(), 2);
        assert!(updated.updated_at > page.updated_at);

        let reread = repo.find_by_slug("landing").await.expect("find").expect("exists");
        assert_eq!(reread, updated);
    }

    #[tokio::test]
    async fn update_of_missing_slug_returns_none() {
        let repo = setup().await;
        let result = repo
            .update_by_slug("missing", &PageUpdate::default(), Utc::now())
            .await
            .expect("update");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn drafts_are_hidden_from_published_lookup() {
        let repo = setup().await;
        repo.insert_if_absent(landing()).await.expect("insert");
        let update = PageUpdate { status: Some(PageStatus::Draft), ..PageUpdate::default() };
        repo.update_by_slug("landing", &update, Utc::now()).await.expect("update");

        assert!(repo.find_published_by_slug("landing").await.expect("find").is_none());
        assert!(repo.find_by_slug("landing").await.expect("find").is_some());
    }

    #[tokio::test]
    async fn unknown_block_types_survive_a_round_trip() {
        let repo = setup().await;
        let mut page = landing();
        page.blocks = vec![serde_json::from_value(serde_json::json!({
            "id": "block-1",
            "type": "carousel",
            "content": {"slides": 3}
        }))
        .expect("block")];
        repo.insert_if_absent(page).await.expect("insert");

        let found = repo.find_by_slug("landing").await.expect("find").expect("exists");
        assert!(matches!(&found.blocks[0].content, BlockContent::Unknown { kind, .. } if kind == "carousel"));
        assert_eq!(repo.list_slugs().await.expect("slugs"), vec!["landing".to_owned()]);
    }
}
