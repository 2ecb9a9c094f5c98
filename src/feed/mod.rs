//! Feed retrieval for the import pipeline.
//!
//! - [`parser`] - converts RSS/Atom bytes into [`ParsedFeed`](crate::model::ParsedFeed)
//!   using the `feed-rs` crate, reduced to the fields the importer reads
//! - [`fetcher`] - the [`FeedSource`] contract and its HTTP implementation
//!
//! The pipeline depends only on [`FeedSource`], so tests can swap in a
//! scripted source without a network.

mod fetcher;
mod parser;

pub(crate) use fetcher::{content_type, read_limited_bytes, USER_AGENT};
pub use fetcher::{FeedFetcher, FeedSource, FetchError, FetchFailure, DEFAULT_FETCH_TIMEOUT};
pub use parser::parse_feed;
