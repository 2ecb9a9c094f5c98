//! Scheduled RSS-to-article importer.
//!
//! Each run takes the newest item of every configured feed, sanitizes it into
//! an article, skips titles that are already published, and stores the rest
//! with a cover image and SEO metadata.

pub mod config;
pub mod content;
pub mod feed;
pub mod import;
pub mod model;
pub mod scheduler;
pub mod storage;
pub mod util;
