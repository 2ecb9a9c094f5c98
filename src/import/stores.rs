use async_trait::async_trait;

use crate::model::{Article, ArticleId, PublishContext, SeoMetadata};
use crate::storage::{MediaError, StoreError};

/// Publishing target for imported articles.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Whether a published article with exactly this title exists.
    async fn exists_by_title(&self, title: &str) -> Result<bool, StoreError>;

    /// Publishes an article and returns its id.
    async fn publish(&self, article: &Article, ctx: &PublishContext)
        -> Result<ArticleId, StoreError>;
}

/// Attaches cover images to published articles.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn attach_cover_image(
        &self,
        article_id: ArticleId,
        image_url: &str,
    ) -> Result<(), MediaError>;
}

/// Stores auxiliary SEO metadata for published articles.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn attach_seo_metadata(
        &self,
        article_id: ArticleId,
        metadata: &SeoMetadata,
    ) -> Result<(), StoreError>;
}
