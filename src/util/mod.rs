//! Utility functions shared across the importer.
//!
//! - **URL validation**: syntactic checks for feed/cover URLs, plus an SSRF
//!   guard for URLs the importer downloads itself
//! - **Text processing**: whitespace collapsing, word-boundary truncation and
//!   control-character stripping
//! - **Clock**: an injectable source of "now" for publication timestamps

mod clock;
mod text;
mod url_validator;

pub use clock::{Clock, FixedClock, SystemClock};
pub use text::{
    collapse_whitespace, display_width, strip_control_chars, take_words_within,
    truncate_words, ELLIPSIS,
};
pub use url_validator::{validate_public_url, validate_url, UrlValidationError};
