use async_trait::async_trait;

use super::schema::Database;
use super::types::{Post, StoreError, STATUS_PUBLISH};
use crate::import::ContentStore;
use crate::model::{Article, ArticleId, PublishContext};

/// Upper bound for `recent_posts` regardless of the requested limit.
const MAX_RECENT_POSTS: i64 = 500;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Most recently published posts, newest first.
    pub async fn recent_posts(&self, limit: i64) -> Result<Vec<Post>, StoreError> {
        let limit = limit.clamp(0, MAX_RECENT_POSTS);
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, title, body_html, source_link, category_id, author_id, status, published_at
            FROM posts
            WHERE status = ?
            ORDER BY published_at DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(STATUS_PUBLISH)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn get_post(&self, id: ArticleId) -> Result<Option<Post>, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            "SELECT id, title, body_html, source_link, category_id, author_id, status, published_at \
             FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    pub(crate) async fn post_exists(&self, id: ArticleId) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl ContentStore for Database {
    async fn exists_by_title(&self, title: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM posts WHERE status = ? AND title = ? LIMIT 1")
                .bind(STATUS_PUBLISH)
                .bind(title)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn publish(
        &self,
        article: &Article,
        ctx: &PublishContext,
    ) -> Result<ArticleId, StoreError> {
        let category_id = i64::try_from(article.category_id)
            .map_err(|_| StoreError::Rejected(format!("category {} out of range", article.category_id)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO posts (title, body_html, source_link, category_id, author_id, status, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&article.title)
        .bind(article.rendered_html())
        .bind(&article.source_link)
        .bind(category_id)
        .bind(ctx.author_id)
        .bind(STATUS_PUBLISH)
        .bind(ctx.published_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }
}
