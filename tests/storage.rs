//! Integration tests for the SQLite stores: publish, look up, attach metadata.
//!
//! Each test creates its own in-memory SQLite database for isolation.
//! The stores are driven through the same traits the import pipeline uses.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use feedpress::import::{ContentStore, MetadataDeriver, MetadataStore};
use feedpress::model::{Article, PublishContext};
use feedpress::storage::{Database, StoreError, STATUS_PUBLISH};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn test_article(title: &str, body: &str) -> Article {
    Article {
        title: title.to_string(),
        body_html: body.to_string(),
        source_link: format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
        category_id: 5,
        cover_image_url: None,
    }
}

fn ctx_at(secs: i64) -> PublishContext {
    PublishContext {
        author_id: 1,
        published_at: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

// ============================================================================
// Publish / Lookup
// ============================================================================

#[tokio::test]
async fn test_published_title_is_found_exactly() {
    let db = test_db().await;
    assert!(!db.exists_by_title("Rust 2.0 Released").await.unwrap());

    db.publish(&test_article("Rust 2.0 Released", "<p>x</p>"), &ctx_at(1_700_000_000))
        .await
        .unwrap();

    assert!(db.exists_by_title("Rust 2.0 Released").await.unwrap());
    assert!(!db.exists_by_title("rust 2.0 released").await.unwrap());
}

#[tokio::test]
async fn test_publish_assigns_increasing_ids() {
    let db = test_db().await;
    let a = db.publish(&test_article("A", "a"), &ctx_at(1)).await.unwrap();
    let b = db.publish(&test_article("B", "b"), &ctx_at(2)).await.unwrap();
    assert!(b > a);
}

#[tokio::test]
async fn test_recent_posts_round_trip() {
    let db = test_db().await;
    let id = db
        .publish(&test_article("Stored Post", "<p>Body</p>"), &ctx_at(1_704_067_200))
        .await
        .unwrap();

    let posts = db.recent_posts(5).await.unwrap();
    assert_eq!(posts.len(), 1);
    let post = &posts[0];
    assert_eq!(post.id, id);
    assert_eq!(post.status, STATUS_PUBLISH);
    assert_eq!(post.source_link, "https://example.com/stored-post");
    assert_eq!(
        post.published_at_utc(),
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    );
}

// ============================================================================
// Metadata
// ============================================================================

#[tokio::test]
async fn test_derived_metadata_is_stored() {
    let db = test_db().await;
    let article = test_article("Quarterly Results Are In", "<p>Revenue grew in every region this quarter.</p>");
    let id = db.publish(&article, &ctx_at(10)).await.unwrap();

    let seo = MetadataDeriver::new("Biz Daily").derive(&article);
    db.attach_seo_metadata(id, &seo).await.unwrap();

    let meta = db.post_meta(id).await.unwrap();
    assert_eq!(
        meta,
        vec![
            (
                "_seo_focuskw".to_string(),
                "Revenue, grew, in, every, region".to_string()
            ),
            (
                "_seo_metadesc".to_string(),
                "Revenue grew in every region this quarter.".to_string()
            ),
            (
                "_seo_title".to_string(),
                "Quarterly Results Are In | Biz Daily".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn test_metadata_for_unknown_post_is_rejected() {
    let db = test_db().await;
    let seo = MetadataDeriver::new("B").derive(&test_article("T", "t"));
    let err = db.attach_seo_metadata(77, &seo).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
    assert!(db.post_meta(77).await.unwrap().is_empty());
}
