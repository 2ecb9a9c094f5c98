use std::sync::Arc;

use super::stores::ContentStore;
use crate::storage::StoreError;

/// Guards publication against articles that already exist.
///
/// Matching is exact and case-sensitive on the sanitized title, across all
/// feeds: two feeds publishing the same headline count as one article.
#[derive(Clone)]
pub struct Deduplicator {
    store: Arc<dyn ContentStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Whether an article titled exactly `title` is already published.
    pub async fn exists(&self, title: &str) -> Result<bool, StoreError> {
        self.store.exists_by_title(title).await
    }
}
