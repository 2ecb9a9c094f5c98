use async_trait::async_trait;
use reqwest::redirect::Policy;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::post_meta::META_THUMBNAIL_ID;
use super::schema::Database;
use super::types::{MediaError, MediaItem, StoreError};
use crate::feed::{content_type, read_limited_bytes, FetchFailure, DEFAULT_FETCH_TIMEOUT, USER_AGENT};
use crate::import::MediaStore;
use crate::model::ArticleId;
use crate::util::{validate_public_url, validate_url, Clock, SystemClock, UrlValidationError};

const MAX_IMAGE_SIZE: usize = 20 * 1024 * 1024; // 20MB
const MAX_REDIRECTS: usize = 3;

/// Extensions accepted as images when the server sends no useful Content-Type.
const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("bmp", "image/bmp"),
];

/// Downloads cover images into a local directory and links them to posts.
///
/// Files are named by the SHA-256 of their bytes, so the same image
/// imported twice is stored once on disk (but gets one `media` row per post).
///
/// The library owns its HTTP client: every redirect hop is checked against
/// the same host rules as the original image URL.
#[derive(Clone)]
pub struct MediaLibrary {
    db: Database,
    client: reqwest::Client,
    media_dir: PathBuf,
    timeout: Duration,
    allow_private_hosts: bool,
    clock: Arc<dyn Clock>,
}

impl MediaLibrary {
    /// Library that refuses localhost and private-range image hosts,
    /// including redirect targets.
    pub fn new(db: Database, media_dir: impl Into<PathBuf>) -> Result<Self, reqwest::Error> {
        Self::build(db, media_dir.into(), false)
    }

    /// Library that skips the localhost/private-range check. Only for tests
    /// and trusted local setups.
    pub fn allowing_private_hosts(
        db: Database,
        media_dir: impl Into<PathBuf>,
    ) -> Result<Self, reqwest::Error> {
        Self::build(db, media_dir.into(), true)
    }

    fn build(db: Database, media_dir: PathBuf, allow_private_hosts: bool) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .redirect(redirect_policy(allow_private_hosts))
            .build()?;
        Ok(Self {
            db,
            client,
            media_dir,
            timeout: DEFAULT_FETCH_TIMEOUT,
            allow_private_hosts,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the wall clock used for `created_at` on media rows.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Download `image_url`, store it, and make it the cover of `post_id`.
    pub async fn sideload(
        &self,
        post_id: ArticleId,
        image_url: &str,
    ) -> Result<MediaItem, MediaError> {
        let url = check_host(image_url, self.allow_private_hosts)?;

        if !self.db.post_exists(post_id).await? {
            return Err(StoreError::Rejected(format!("post {post_id} does not exist")).into());
        }

        let (bytes, mime_type) = self.download_image(&url).await?;

        let digest = Sha256::digest(&bytes);
        let extension = extension_of(&url)
            .filter(|ext| mime_for_extension(ext).is_some())
            .map(str::to_ascii_lowercase)
            .or_else(|| {
                mime_type
                    .as_deref()
                    .and_then(extension_for_mime)
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| "img".to_string());
        let file_path = self.media_dir.join(format!("{:x}.{}", digest, extension));

        tokio::fs::create_dir_all(&self.media_dir).await?;
        if tokio::fs::try_exists(&file_path).await? {
            tracing::debug!(path = %file_path.display(), "Media file already stored");
        } else {
            tokio::fs::write(&file_path, &bytes).await?;
        }

        let created_at = self.clock.now().timestamp();
        let file_path_str = file_path.to_string_lossy().into_owned();
        let byte_size = i64::try_from(bytes.len()).unwrap_or(i64::MAX);

        let result = sqlx::query(
            r#"
            INSERT INTO media (post_id, source_url, file_path, mime_type, byte_size, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(post_id)
        .bind(url.as_str())
        .bind(&file_path_str)
        .bind(&mime_type)
        .bind(byte_size)
        .bind(created_at)
        .execute(&self.db.pool)
        .await?;
        let media_id = result.last_insert_rowid();

        self.db
            .set_post_meta(post_id, META_THUMBNAIL_ID, &media_id.to_string())
            .await?;

        tracing::debug!(
            post_id = post_id,
            media_id = media_id,
            bytes = bytes.len(),
            "Cover image stored"
        );

        Ok(MediaItem {
            id: media_id,
            post_id,
            source_url: url.to_string(),
            file_path: file_path_str,
            mime_type,
            byte_size,
            created_at,
        })
    }

    async fn download_image(&self, url: &Url) -> Result<(Vec<u8>, Option<String>), MediaError> {
        let response = tokio::time::timeout(self.timeout, self.client.get(url.as_str()).send())
            .await
            .map_err(|_| FetchFailure::Timeout)?
            .map_err(FetchFailure::Network)?;

        if !response.status().is_success() {
            return Err(FetchFailure::HttpStatus(response.status().as_u16()).into());
        }

        let header_type = content_type(&response);
        let mime_type = match header_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => Some(ct.to_string()),
            _ => extension_of(url)
                .and_then(mime_for_extension)
                .map(str::to_owned),
        };
        if mime_type.is_none() {
            return Err(MediaError::NotAnImage);
        }

        let bytes = tokio::time::timeout(self.timeout, read_limited_bytes(response, MAX_IMAGE_SIZE))
            .await
            .map_err(|_| FetchFailure::Timeout)??;
        if bytes.is_empty() {
            return Err(MediaError::NotAnImage);
        }

        Ok((bytes, mime_type))
    }

    /// Media rows recorded for a post, oldest first.
    pub async fn media_for_post(&self, post_id: ArticleId) -> Result<Vec<MediaItem>, StoreError> {
        let items = sqlx::query_as::<_, MediaItem>(
            "SELECT id, post_id, source_url, file_path, mime_type, byte_size, created_at \
             FROM media WHERE post_id = ? ORDER BY id",
        )
        .bind(post_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(items)
    }
}

#[async_trait]
impl MediaStore for MediaLibrary {
    async fn attach_cover_image(
        &self,
        article_id: ArticleId,
        image_url: &str,
    ) -> Result<(), MediaError> {
        self.sideload(article_id, image_url).await.map(|_| ())
    }
}

fn check_host(url: &str, allow_private_hosts: bool) -> Result<Url, UrlValidationError> {
    if allow_private_hosts {
        validate_url(url)
    } else {
        validate_public_url(url)
    }
}

/// Redirect policy for image downloads.
///
/// - Limits redirects to [`MAX_REDIRECTS`] hops
/// - Detects redirect loops (same URL appearing twice in chain)
/// - Applies the host check to every hop
fn redirect_policy(allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt| {
        match check_redirect(attempt.url(), attempt.previous(), allow_private_hosts) {
            Ok(()) => {
                tracing::debug!(
                    from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
                    to = %attempt.url(),
                    hop = attempt.previous().len(),
                    "Following image redirect"
                );
                attempt.follow()
            }
            Err(reason) => attempt.error(reason),
        }
    })
}

/// Decides whether a redirect to `next` may be followed. `previous` holds
/// the URLs already requested, starting with the original one.
fn check_redirect(next: &Url, previous: &[Url], allow_private_hosts: bool) -> Result<(), String> {
    if previous.len() > MAX_REDIRECTS {
        return Err(format!("Too many redirects (max {MAX_REDIRECTS})"));
    }
    if previous.iter().any(|prev| prev.as_str() == next.as_str()) {
        return Err("Redirect loop detected".to_string());
    }
    check_host(next.as_str(), allow_private_hosts)
        .map(|_| ())
        .map_err(|e| format!("Redirect to {next} refused: {e}"))
}

fn extension_of(url: &Url) -> Option<&str> {
    let name = url.path_segments()?.next_back()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    IMAGE_EXTENSIONS
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    IMAGE_EXTENSIONS
        .iter()
        .find(|(_, m)| *m == mime)
        .map(|(ext, _)| *ext)
}
