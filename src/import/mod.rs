//! The import run: one newest item per feed, deduplicated by title, published
//! with a cover image and SEO metadata.
//!
//! Storage is reached only through the traits in [`stores`], so the pipeline
//! can be driven against SQLite or against in-memory fakes.

mod dedup;
mod outcome;
mod pipeline;
mod seo;
pub mod stores;

pub use dedup::Deduplicator;
pub use outcome::{ImportOutcome, ImportResult, NOTHING_IMPORTED_NOTICE};
pub use pipeline::{ImportError, ImportOptions, ImportPipeline};
pub use seo::MetadataDeriver;
pub use stores::{ContentStore, MediaStore, MetadataStore};
