use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use super::dedup::Deduplicator;
use super::outcome::{ImportOutcome, ImportResult};
use super::seo::MetadataDeriver;
use super::stores::{ContentStore, MediaStore, MetadataStore};
use crate::content::{sanitize_title, ContentExtractor};
use crate::feed::{FeedSource, FetchError};
use crate::model::{Article, ArticleId, FeedConfig, PublishContext};
use crate::storage::{MediaError, StoreError};
use crate::util::{validate_url, Clock, SystemClock};

/// Per-feed failures past the fetch stage.
///
/// `PublishFailed` and `DuplicateLookupFailed` end the feed with a `Failed`
/// outcome. The two attach errors are only logged: the article is already
/// published when they happen.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Duplicate lookup failed: {0}")]
    DuplicateLookupFailed(#[source] StoreError),
    #[error("Publish failed: {0}")]
    PublishFailed(#[source] StoreError),
    #[error("Cover image attach failed: {0}")]
    MediaAttachFailed(#[source] MediaError),
    #[error("SEO metadata attach failed: {0}")]
    MetadataAttachFailed(#[source] StoreError),
}

/// Settings the pipeline needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Suffix for derived SEO titles.
    pub brand: String,
    /// Actor recorded as the author of published articles.
    pub author_id: i64,
}

/// Fetches, converts, deduplicates and publishes the newest item of each
/// configured feed.
///
/// Feeds are processed one at a time in configuration order. Every feed ends
/// in at most one [`ImportOutcome`]; nothing a single feed does can abort the
/// run. Concurrent calls on the same pipeline are serialized.
pub struct ImportPipeline {
    source: Arc<dyn FeedSource>,
    content: Arc<dyn ContentStore>,
    media: Arc<dyn MediaStore>,
    metadata: Arc<dyn MetadataStore>,
    dedup: Deduplicator,
    extractor: ContentExtractor,
    deriver: MetadataDeriver,
    clock: Arc<dyn Clock>,
    author_id: i64,
    run_lock: Mutex<()>,
}

impl ImportPipeline {
    pub fn new(
        source: Arc<dyn FeedSource>,
        content: Arc<dyn ContentStore>,
        media: Arc<dyn MediaStore>,
        metadata: Arc<dyn MetadataStore>,
        options: ImportOptions,
    ) -> Self {
        Self {
            source,
            dedup: Deduplicator::new(Arc::clone(&content)),
            content,
            media,
            metadata,
            extractor: ContentExtractor::new(),
            deriver: MetadataDeriver::new(options.brand),
            clock: Arc::new(SystemClock),
            author_id: options.author_id,
            run_lock: Mutex::new(()),
        }
    }

    /// Replaces the wall clock used for publication timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs the import over `feeds` and returns one outcome per feed that had
    /// something to report, in feed order.
    pub async fn run_all(&self, feeds: &[FeedConfig]) -> ImportResult {
        let _guard = self.run_lock.lock().await;

        let mut result = ImportResult::default();
        for feed in feeds {
            if let Some(outcome) = self.import_feed(feed).await {
                result.push(outcome);
            }
        }

        tracing::info!(
            feeds = feeds.len(),
            outcomes = result.outcomes.len(),
            imported = result.imported_count(),
            "Import run finished"
        );
        result
    }

    async fn import_feed(&self, feed: &FeedConfig) -> Option<ImportOutcome> {
        if let Err(e) = validate_url(&feed.url) {
            tracing::debug!(feed = %feed.url, error = %e, "Skipping feed with invalid URL");
            return Some(ImportOutcome::SkippedInvalidUrl {
                url: feed.url.clone(),
            });
        }

        let parsed = match self.source.fetch(&feed.url).await {
            Ok(parsed) => parsed,
            Err(FetchError::InvalidUrl(e)) => {
                tracing::debug!(feed = %feed.url, error = %e, "Feed source rejected URL");
                return Some(ImportOutcome::SkippedInvalidUrl {
                    url: feed.url.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(feed = %feed.url, error = %e, "Failed to load feed");
                return Some(ImportOutcome::SkippedInvalidFeed {
                    url: feed.url.clone(),
                });
            }
        };

        let Some(item) = parsed.newest() else {
            tracing::debug!(feed = %feed.url, "Feed has no items");
            return None;
        };

        let title = sanitize_title(&item.title);
        match self.dedup.exists(&title).await {
            Ok(true) => {
                tracing::debug!(feed = %feed.url, title = %title, "Article already published");
                return Some(ImportOutcome::SkippedDuplicate { title });
            }
            Ok(false) => {}
            Err(e) => {
                return Some(self.failed(feed, ImportError::DuplicateLookupFailed(e)));
            }
        }

        let article = self.extractor.extract(item, feed);
        let ctx = PublishContext {
            author_id: self.author_id,
            published_at: self.clock.now(),
        };

        let article_id = match self.content.publish(&article, &ctx).await {
            Ok(id) => id,
            Err(e) => return Some(self.failed(feed, ImportError::PublishFailed(e))),
        };

        tracing::info!(
            feed = %feed.url,
            article_id = article_id,
            title = %article.title,
            "Imported article"
        );

        self.attach_cover(article_id, &article).await;
        self.attach_metadata(article_id, &article).await;

        Some(ImportOutcome::Imported {
            article_id,
            title: article.title,
        })
    }

    async fn attach_cover(&self, article_id: ArticleId, article: &Article) {
        let Some(image_url) = article.cover_image_url.as_deref() else {
            return;
        };
        if validate_url(image_url).is_err() {
            tracing::debug!(article_id = article_id, image = %image_url, "Ignoring invalid cover image URL");
            return;
        }

        if let Err(e) = self.media.attach_cover_image(article_id, image_url).await {
            let err = ImportError::MediaAttachFailed(e);
            tracing::warn!(article_id = article_id, image = %image_url, error = %err, "Cover image not attached");
        }
    }

    async fn attach_metadata(&self, article_id: ArticleId, article: &Article) {
        let seo = self.deriver.derive(article);
        if let Err(e) = self.metadata.attach_seo_metadata(article_id, &seo).await {
            let err = ImportError::MetadataAttachFailed(e);
            tracing::warn!(article_id = article_id, error = %err, "SEO metadata not attached");
        }
    }

    fn failed(&self, feed: &FeedConfig, err: ImportError) -> ImportOutcome {
        tracing::warn!(feed = %feed.url, error = %err, "Feed import failed");
        ImportOutcome::Failed {
            url: feed.url.clone(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FetchFailure;
    use crate::model::{ParsedFeed, RawFeedItem, SeoMetadata};
    use crate::util::FixedClock;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeSource {
        feeds: HashMap<String, ParsedFeed>,
        calls: StdMutex<Vec<String>>,
    }

    impl FakeSource {
        fn with(mut self, url: &str, items: Vec<RawFeedItem>) -> Self {
            self.feeds.insert(url.to_string(), ParsedFeed { title: None, items });
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FeedSource for FakeSource {
        async fn fetch(&self, url: &str) -> Result<ParsedFeed, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.feeds
                .get(url)
                .cloned()
                .ok_or(FetchError::FetchFailed(FetchFailure::HttpStatus(404)))
        }
    }

    #[derive(Default)]
    struct FakeStore {
        published: StdMutex<Vec<(Article, PublishContext)>>,
        seo: StdMutex<Vec<(ArticleId, SeoMetadata)>>,
        covers: StdMutex<Vec<(ArticleId, String)>>,
        reject_publish: bool,
        fail_lookup: bool,
        fail_media: bool,
        fail_seo: bool,
    }

    impl FakeStore {
        fn titles(&self) -> Vec<String> {
            self.published
                .lock()
                .unwrap()
                .iter()
                .map(|(a, _)| a.title.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ContentStore for FakeStore {
        async fn exists_by_title(&self, title: &str) -> Result<bool, StoreError> {
            if self.fail_lookup {
                return Err(StoreError::Rejected("lookup down".into()));
            }
            Ok(self
                .published
                .lock()
                .unwrap()
                .iter()
                .any(|(a, _)| a.title == title))
        }

        async fn publish(
            &self,
            article: &Article,
            ctx: &PublishContext,
        ) -> Result<ArticleId, StoreError> {
            if self.reject_publish {
                return Err(StoreError::Rejected("read-only".into()));
            }
            let mut published = self.published.lock().unwrap();
            published.push((article.clone(), *ctx));
            Ok(published.len() as ArticleId)
        }
    }

    #[async_trait]
    impl MediaStore for FakeStore {
        async fn attach_cover_image(
            &self,
            article_id: ArticleId,
            image_url: &str,
        ) -> Result<(), MediaError> {
            if self.fail_media {
                return Err(MediaError::NotAnImage);
            }
            self.covers
                .lock()
                .unwrap()
                .push((article_id, image_url.to_string()));
            Ok(())
        }
    }

    #[async_trait]
    impl MetadataStore for FakeStore {
        async fn attach_seo_metadata(
            &self,
            article_id: ArticleId,
            metadata: &SeoMetadata,
        ) -> Result<(), StoreError> {
            if self.fail_seo {
                return Err(StoreError::Rejected("meta".into()));
            }
            self.seo
                .lock()
                .unwrap()
                .push((article_id, metadata.clone()));
            Ok(())
        }
    }

    fn item(title: &str, body: &str) -> RawFeedItem {
        RawFeedItem {
            title: title.into(),
            content: Some(body.into()),
            link: format!("https://src.test/{}", title.replace(' ', "-")),
            ..Default::default()
        }
    }

    fn pipeline(source: Arc<FakeSource>, store: Arc<FakeStore>) -> ImportPipeline {
        ImportPipeline::new(
            source,
            store.clone(),
            store.clone(),
            store,
            ImportOptions {
                brand: "Brand".into(),
                author_id: 7,
            },
        )
    }

    #[tokio::test]
    async fn test_imports_newest_item_only() {
        let source = Arc::new(FakeSource::default().with(
            "https://a.test/rss",
            vec![item("Newest", "<p>new</p>"), item("Older", "<p>old</p>")],
        ));
        let store = Arc::new(FakeStore::default());
        let result = pipeline(source, store.clone())
            .run_all(&[FeedConfig::new("https://a.test/rss", 3)])
            .await;

        assert_eq!(
            result.outcomes,
            vec![ImportOutcome::Imported {
                article_id: 1,
                title: "Newest".into()
            }]
        );
        assert_eq!(store.titles(), vec!["Newest".to_string()]);

        let published = store.published.lock().unwrap();
        let (article, ctx) = &published[0];
        assert_eq!(article.category_id, 3);
        assert_eq!(ctx.author_id, 7);
    }

    #[tokio::test]
    async fn test_invalid_urls_are_never_fetched() {
        let source = Arc::new(FakeSource::default());
        let store = Arc::new(FakeStore::default());
        let result = pipeline(source.clone(), store)
            .run_all(&[FeedConfig::new("", 0), FeedConfig::new("ftp://a.test/rss", 0)])
            .await;

        assert_eq!(
            result.outcomes,
            vec![
                ImportOutcome::SkippedInvalidUrl { url: String::new() },
                ImportOutcome::SkippedInvalidUrl {
                    url: "ftp://a.test/rss".into()
                },
            ]
        );
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_stop_run() {
        let source = Arc::new(FakeSource::default().with("https://ok.test/rss", vec![item("Fine", "x")]));
        let store = Arc::new(FakeStore::default());
        let result = pipeline(source, store)
            .run_all(&[
                FeedConfig::new("https://down.test/rss", 0),
                FeedConfig::new("https://ok.test/rss", 0),
            ])
            .await;

        assert_eq!(
            result.outcomes,
            vec![
                ImportOutcome::SkippedInvalidFeed {
                    url: "https://down.test/rss".into()
                },
                ImportOutcome::Imported {
                    article_id: 1,
                    title: "Fine".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_feed_has_no_outcome() {
        let source = Arc::new(FakeSource::default().with("https://a.test/rss", vec![]));
        let store = Arc::new(FakeStore::default());
        let result = pipeline(source, store)
            .run_all(&[FeedConfig::new("https://a.test/rss", 0)])
            .await;
        assert!(result.outcomes.is_empty());
        assert!(!result.any_imported());
    }

    #[tokio::test]
    async fn test_second_run_skips_duplicate() {
        let source = Arc::new(FakeSource::default().with("https://a.test/rss", vec![item("Same", "x")]));
        let store = Arc::new(FakeStore::default());
        let pipeline = pipeline(source, store.clone());
        let feeds = [FeedConfig::new("https://a.test/rss", 0)];

        assert!(pipeline.run_all(&feeds).await.any_imported());
        let second = pipeline.run_all(&feeds).await;

        assert_eq!(
            second.outcomes,
            vec![ImportOutcome::SkippedDuplicate {
                title: "Same".into()
            }]
        );
        assert_eq!(store.titles().len(), 1);
    }

    #[tokio::test]
    async fn test_two_feeds_same_title_in_one_run() {
        let source = Arc::new(
            FakeSource::default()
                .with("https://a.test/rss", vec![item("Shared", "a")])
                .with("https://b.test/rss", vec![item("Shared", "b")]),
        );
        let store = Arc::new(FakeStore::default());
        let result = pipeline(source, store.clone())
            .run_all(&[
                FeedConfig::new("https://a.test/rss", 0),
                FeedConfig::new("https://b.test/rss", 0),
            ])
            .await;

        assert!(result.outcomes[0].is_imported());
        assert_eq!(
            result.outcomes[1],
            ImportOutcome::SkippedDuplicate {
                title: "Shared".into()
            }
        );
        assert_eq!(store.titles().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_rejection_is_failed_outcome() {
        let source = Arc::new(FakeSource::default().with("https://a.test/rss", vec![item("T", "x")]));
        let store = Arc::new(FakeStore {
            reject_publish: true,
            ..Default::default()
        });
        let result = pipeline(source, store.clone())
            .run_all(&[FeedConfig::new("https://a.test/rss", 0)])
            .await;

        match &result.outcomes[..] {
            [ImportOutcome::Failed { url, reason }] => {
                assert_eq!(url, "https://a.test/rss");
                assert!(reason.contains("read-only"));
            }
            other => panic!("Expected a single Failed outcome, got {other:?}"),
        }
        assert!(store.seo.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_error_is_failed_outcome() {
        let source = Arc::new(FakeSource::default().with("https://a.test/rss", vec![item("T", "x")]));
        let store = Arc::new(FakeStore {
            fail_lookup: true,
            ..Default::default()
        });
        let result = pipeline(source, store.clone())
            .run_all(&[FeedConfig::new("https://a.test/rss", 0)])
            .await;

        assert!(matches!(result.outcomes[..], [ImportOutcome::Failed { .. }]));
        assert!(store.titles().is_empty());
    }

    #[tokio::test]
    async fn test_attach_failures_keep_imported() {
        let mut raw = item("Pic", r#"<p>Body <img src="https://img.test/a.png"></p>"#);
        raw.enclosure_link = None;
        let source = Arc::new(FakeSource::default().with("https://a.test/rss", vec![raw]));
        let store = Arc::new(FakeStore {
            fail_media: true,
            fail_seo: true,
            ..Default::default()
        });
        let result = pipeline(source, store)
            .run_all(&[FeedConfig::new("https://a.test/rss", 0)])
            .await;

        assert!(result.outcomes[0].is_imported());
    }

    #[tokio::test]
    async fn test_cover_and_seo_attached() {
        let mut raw = item("Pic", r#"<p>Body text <img src="https://img.test/a.png"></p>"#);
        raw.enclosure_link = Some("https://img.test/cover.jpg".into());
        let source = Arc::new(FakeSource::default().with("https://a.test/rss", vec![raw]));
        let store = Arc::new(FakeStore::default());
        pipeline(source, store.clone())
            .run_all(&[FeedConfig::new("https://a.test/rss", 0)])
            .await;

        assert_eq!(
            *store.covers.lock().unwrap(),
            vec![(1, "https://img.test/cover.jpg".to_string())]
        );
        let seo = store.seo.lock().unwrap();
        assert_eq!(seo[0].0, 1);
        assert_eq!(seo[0].1.short_title, "Pic | Brand");
        assert_eq!(seo[0].1.keyphrase, "Body, text");
    }

    #[tokio::test]
    async fn test_invalid_cover_url_is_not_attached() {
        let raw = item("NoPic", r#"<p><img src="/relative.png"></p>"#);
        let source = Arc::new(FakeSource::default().with("https://a.test/rss", vec![raw]));
        let store = Arc::new(FakeStore::default());
        let result = pipeline(source, store.clone())
            .run_all(&[FeedConfig::new("https://a.test/rss", 0)])
            .await;

        assert!(result.outcomes[0].is_imported());
        assert!(store.covers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_uses_clock() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let source = Arc::new(FakeSource::default().with("https://a.test/rss", vec![item("T", "x")]));
        let store = Arc::new(FakeStore::default());
        pipeline(source, store.clone())
            .with_clock(Arc::new(FixedClock(at)))
            .run_all(&[FeedConfig::new("https://a.test/rss", 0)])
            .await;

        assert_eq!(store.published.lock().unwrap()[0].1.published_at, at);
    }

    #[tokio::test]
    async fn test_concurrent_runs_do_not_double_publish() {
        let source = Arc::new(FakeSource::default().with("https://a.test/rss", vec![item("Once", "x")]));
        let store = Arc::new(FakeStore::default());
        let pipeline = Arc::new(pipeline(source, store.clone()));
        let feeds = vec![FeedConfig::new("https://a.test/rss", 0)];

        let a = {
            let (p, f) = (pipeline.clone(), feeds.clone());
            tokio::spawn(async move { p.run_all(&f).await })
        };
        let b = {
            let (p, f) = (pipeline.clone(), feeds.clone());
            tokio::spawn(async move { p.run_all(&f).await })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a.imported_count() + b.imported_count(), 1);
        assert_eq!(store.titles().len(), 1);
    }
}
