use async_trait::async_trait;

use super::schema::Database;
use super::types::StoreError;
use crate::import::MetadataStore;
use crate::model::{ArticleId, SeoMetadata};

pub const META_SEO_TITLE: &str = "_seo_title";
pub const META_SEO_DESCRIPTION: &str = "_seo_metadesc";
pub const META_SEO_KEYPHRASE: &str = "_seo_focuskw";
pub const META_THUMBNAIL_ID: &str = "_thumbnail_id";

impl Database {
    /// All meta rows of a post as `(key, value)`, ordered by key.
    pub async fn post_meta(&self, post_id: ArticleId) -> Result<Vec<(String, String)>, StoreError> {
        let rows = sqlx::query_as(
            "SELECT meta_key, meta_value FROM post_meta WHERE post_id = ? ORDER BY meta_key",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_post_meta(
        &self,
        post_id: ArticleId,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT meta_value FROM post_meta WHERE post_id = ? AND meta_key = ?")
                .bind(post_id)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v))
    }

    /// Insert or replace one meta value. The post must exist.
    pub async fn set_post_meta(
        &self,
        post_id: ArticleId,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        if !self.post_exists(post_id).await? {
            return Err(StoreError::Rejected(format!("post {post_id} does not exist")));
        }

        sqlx::query(
            r#"
            INSERT INTO post_meta (post_id, meta_key, meta_value) VALUES (?, ?, ?)
            ON CONFLICT(post_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value
        "#,
        )
        .bind(post_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for Database {
    async fn attach_seo_metadata(
        &self,
        article_id: ArticleId,
        metadata: &SeoMetadata,
    ) -> Result<(), StoreError> {
        if !self.post_exists(article_id).await? {
            return Err(StoreError::Rejected(format!("post {article_id} does not exist")));
        }

        let entries = [
            (META_SEO_TITLE, metadata.short_title.as_str()),
            (META_SEO_DESCRIPTION, metadata.short_description.as_str()),
            (META_SEO_KEYPHRASE, metadata.keyphrase.as_str()),
        ];

        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO post_meta (post_id, meta_key, meta_value) VALUES (?, ?, ?)
                ON CONFLICT(post_id, meta_key) DO UPDATE SET meta_value = excluded.meta_value
            "#,
            )
            .bind(article_id)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}
