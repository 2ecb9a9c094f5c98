mod media;
mod post_meta;
mod posts;
mod schema;
mod types;

pub use media::MediaLibrary;
pub use post_meta::{META_SEO_DESCRIPTION, META_SEO_KEYPHRASE, META_SEO_TITLE, META_THUMBNAIL_ID};
pub use schema::Database;
pub use types::{DatabaseError, MediaError, MediaItem, Post, StoreError, STATUS_PUBLISH};
