//! End-to-end import runs: wiremock-served feeds and images, the real
//! fetcher, and an in-memory SQLite database.
//!
//! Each test starts its own mock server and database for isolation.

use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feedpress::feed::FeedFetcher;
use feedpress::import::{ImportOptions, ImportOutcome, ImportPipeline, NOTHING_IMPORTED_NOTICE};
use feedpress::model::FeedConfig;
use feedpress::storage::{
    Database, MediaLibrary, META_SEO_DESCRIPTION, META_SEO_KEYPHRASE, META_SEO_TITLE,
    META_THUMBNAIL_ID,
};

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

struct Harness {
    server: MockServer,
    db: Database,
    pipeline: ImportPipeline,
    media_dir: PathBuf,
}

impl Harness {
    async fn new(tag: &str) -> Self {
        let server = MockServer::start().await;
        let db = Database::open(":memory:").await.unwrap();
        let media_dir =
            std::env::temp_dir().join(format!("feedpress-it-{}-{}", tag, std::process::id()));

        let fetcher = FeedFetcher::with_client(reqwest::Client::new(), Duration::from_secs(5));
        let media = MediaLibrary::allowing_private_hosts(db.clone(), &media_dir)
            .unwrap()
            .with_timeout(Duration::from_secs(5));
        let store = Arc::new(db.clone());

        let pipeline = ImportPipeline::new(
            Arc::new(fetcher),
            store.clone(),
            Arc::new(media),
            store,
            ImportOptions {
                brand: "Test Wire".to_string(),
                author_id: 2,
            },
        );

        Self {
            server,
            db,
            pipeline,
            media_dir,
        }
    }

    fn url(&self, p: &str) -> String {
        format!("{}{}", self.server.uri(), p)
    }

    async fn serve_rss(&self, p: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("Content-Type", "application/rss+xml"),
            )
            .mount(&self.server)
            .await;
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_dir);
    }
}

fn rss(items: &[(&str, &str, &str)]) -> String {
    let mut out = String::from(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title>"#);
    for (title, link, description) in items {
        out.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link><description><![CDATA[{description}]]></description></item>"
        ));
    }
    out.push_str("</channel></rss>");
    out
}

#[tokio::test]
async fn test_new_item_and_empty_slot() {
    let h = Harness::new("example").await;
    h.serve_rss(
        "/rss",
        rss(&[("Hello World", "https://a.test/hello", "<p>Greetings from the test feed.</p>")]),
    )
    .await;

    let feeds = [FeedConfig::new(h.url("/rss"), 1), FeedConfig::new("", 0)];
    let result = h.pipeline.run_all(&feeds).await;

    let id = match &result.outcomes[..] {
        [ImportOutcome::Imported { article_id, title }, ImportOutcome::SkippedInvalidUrl { url }] => {
            assert_eq!(title, "Hello World");
            assert_eq!(url, "");
            *article_id
        }
        other => panic!("unexpected outcomes: {other:?}"),
    };
    assert!(result.any_imported());

    let post = h.db.get_post(id).await.unwrap().unwrap();
    assert_eq!(post.title, "Hello World");
    assert_eq!(post.category_id, 1);
    assert_eq!(post.author_id, 2);
    assert!(post.body_html.starts_with("<p>Greetings from the test feed.</p>"));
    assert!(post
        .body_html
        .ends_with(r#"<a href="https://a.test/hello" target="_blank">this site</a>.</em></p>"#));

    assert_eq!(
        h.db.get_post_meta(id, META_SEO_TITLE).await.unwrap().as_deref(),
        Some("Hello World | Test Wire")
    );
    assert_eq!(
        h.db.get_post_meta(id, META_SEO_DESCRIPTION).await.unwrap().as_deref(),
        Some("Greetings from the test feed.")
    );
    assert_eq!(
        h.db.get_post_meta(id, META_SEO_KEYPHRASE).await.unwrap().as_deref(),
        Some("Greetings, from, the, test, feed.")
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let h = Harness::new("rerun").await;
    h.serve_rss("/rss", rss(&[("Only Once", "https://a.test/1", "<p>x</p>")])).await;
    let feeds = [FeedConfig::new(h.url("/rss"), 0)];

    let first = h.pipeline.run_all(&feeds).await;
    let second = h.pipeline.run_all(&feeds).await;

    assert_eq!(first.imported_count(), 1);
    assert_eq!(
        second.outcomes,
        vec![ImportOutcome::SkippedDuplicate {
            title: "Only Once".to_string()
        }]
    );
    assert_eq!(
        second.status_lines(),
        vec![
            "Post \"Only Once\" already exists. Skipping import.".to_string(),
            NOTHING_IMPORTED_NOTICE.to_string(),
        ]
    );
    assert_eq!(h.db.recent_posts(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_broken_feed_does_not_block_others() {
    let h = Harness::new("isolation").await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;
    h.serve_rss("/garbage", "<<<not xml".to_string()).await;
    h.serve_rss("/ok", rss(&[("Survivor", "https://a.test/s", "<p>fine</p>")])).await;
    h.serve_rss("/empty", rss(&[])).await;

    let feeds = [
        FeedConfig::new(h.url("/down"), 0),
        FeedConfig::new("not a url", 0),
        FeedConfig::new(h.url("/garbage"), 0),
        FeedConfig::new(h.url("/empty"), 0),
        FeedConfig::new(h.url("/ok"), 0),
    ];
    let result = h.pipeline.run_all(&feeds).await;

    assert_eq!(
        result.outcomes,
        vec![
            ImportOutcome::SkippedInvalidFeed { url: h.url("/down") },
            ImportOutcome::SkippedInvalidUrl {
                url: "not a url".to_string()
            },
            ImportOutcome::SkippedInvalidFeed {
                url: h.url("/garbage")
            },
            ImportOutcome::Imported {
                article_id: 1,
                title: "Survivor".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_only_newest_item_imported() {
    let h = Harness::new("newest").await;
    h.serve_rss(
        "/rss",
        rss(&[
            ("Newest", "https://a.test/3", "<p>3</p>"),
            ("Middle", "https://a.test/2", "<p>2</p>"),
            ("Oldest", "https://a.test/1", "<p>1</p>"),
        ]),
    )
    .await;

    h.pipeline.run_all(&[FeedConfig::new(h.url("/rss"), 0)]).await;

    let titles: Vec<String> = h
        .db
        .recent_posts(10)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert_eq!(titles, vec!["Newest".to_string()]);
}

#[tokio::test]
async fn test_cover_image_from_body_is_sideloaded() {
    let h = Harness::new("cover").await;
    Mock::given(method("GET"))
        .and(path("/img/cover.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(PNG_BYTES)
                .insert_header("Content-Type", "image/png"),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    let body = format!(r#"<p>Story</p><img src="{}" alt="c">"#, h.url("/img/cover.png"));
    h.serve_rss("/rss", rss(&[("With Cover", "https://a.test/c", &body)])).await;

    let result = h.pipeline.run_all(&[FeedConfig::new(h.url("/rss"), 0)]).await;
    assert!(result.any_imported());

    let thumb = h.db.get_post_meta(1, META_THUMBNAIL_ID).await.unwrap();
    assert!(thumb.is_some());
    let files: Vec<_> = std::fs::read_dir(&h.media_dir).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[tokio::test]
async fn test_failed_cover_download_still_imports() {
    let h = Harness::new("badcover").await;
    Mock::given(method("GET"))
        .and(path("/img/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.server)
        .await;
    let body = format!(r#"<p>Story</p><img src="{}">"#, h.url("/img/missing.png"));
    h.serve_rss("/rss", rss(&[("No Cover", "https://a.test/n", &body)])).await;

    let result = h.pipeline.run_all(&[FeedConfig::new(h.url("/rss"), 0)]).await;

    assert_eq!(
        result.outcomes,
        vec![ImportOutcome::Imported {
            article_id: 1,
            title: "No Cover".to_string()
        }]
    );
    assert_eq!(h.db.get_post_meta(1, META_THUMBNAIL_ID).await.unwrap(), None);
    assert!(h.db.get_post_meta(1, META_SEO_TITLE).await.unwrap().is_some());
}

#[tokio::test]
async fn test_item_without_body_gets_placeholder() {
    let h = Harness::new("placeholder").await;
    h.serve_rss(
        "/rss",
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title>
<item><title>Bare</title><link>https://a.test/bare</link></item>
</channel></rss>"#
            .to_string(),
    )
    .await;

    h.pipeline.run_all(&[FeedConfig::new(h.url("/rss"), 0)]).await;

    let post = h.db.get_post(1).await.unwrap().unwrap();
    assert!(post.body_html.starts_with(
        r#"Full content not available. <a href="https://a.test/bare" target="_blank">See the original article</a>."#
    ));
}

#[tokio::test]
async fn test_script_stripped_from_title_and_body() {
    let h = Harness::new("sanitize").await;
    h.serve_rss(
        "/rss",
        rss(&[(
            "Safe &lt;b&gt;Title&lt;/b&gt;",
            "https://a.test/x",
            "<p onclick=\"x()\">Body</p><script>alert(1)</script>",
        )]),
    )
    .await;

    let result = h.pipeline.run_all(&[FeedConfig::new(h.url("/rss"), 0)]).await;
    assert_eq!(
        result.outcomes,
        vec![ImportOutcome::Imported {
            article_id: 1,
            title: "Safe Title".to_string()
        }]
    );

    let post = h.db.get_post(1).await.unwrap().unwrap();
    assert!(!post.body_html.contains("script"));
    assert!(!post.body_html.contains("onclick"));
    assert!(post.body_html.starts_with("<p>Body</p>"));
}
