use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::feed::FetchFailure;
use crate::util::UrlValidationError;

// ============================================================================
// Error Types
// ============================================================================

/// Errors opening or migrating the database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("Another instance of feedpress appears to be running. Please close it and try again.")]
    InstanceLocked,

    #[error("Database migration failed: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map sqlx errors that indicate a locked database to `InstanceLocked`.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and SQLITE_CANTOPEN all surface through the message text.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

/// Errors from the content and metadata stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store refused the operation (e.g. the target post does not exist).
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Errors sideloading a cover image into the media library.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid image URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    #[error("Image download failed: {0}")]
    Download(#[from] FetchFailure),

    /// Neither the Content-Type nor the file extension says image.
    #[error("Not an image")]
    NotAnImage,

    #[error("Failed to write media file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to record media: {0}")]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for MediaError {
    fn from(err: sqlx::Error) -> Self {
        MediaError::Store(StoreError::Database(err))
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Publication status written for imported posts.
pub const STATUS_PUBLISH: &str = "publish";

/// A published post as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    /// Rendered body, attribution note included.
    pub body_html: String,
    pub source_link: String,
    pub category_id: i64,
    pub author_id: i64,
    pub status: String,
    /// Unix timestamp (seconds).
    pub published_at: i64,
}

impl Post {
    pub fn published_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.published_at, 0)
    }
}

/// A sideloaded image file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct MediaItem {
    pub id: i64,
    pub post_id: i64,
    pub source_url: String,
    /// Absolute path of the stored file.
    pub file_path: String,
    pub mime_type: Option<String>,
    pub byte_size: i64,
    pub created_at: i64,
}
