//! Turning feed items into publishable article bodies.
//!
//! - [`sanitize`] - allow-list HTML sanitizer and plain-text flattening
//! - [`extractor`] - the body fallback chain, cover-image resolution and
//!   attribution markup

mod extractor;
mod sanitize;

pub use extractor::{
    attribution_html, coerce_category, first_image_src, placeholder_html, resolve_cover_image,
    ContentExtractor,
};
pub use sanitize::{escape_attr, plain_text, sanitize_html, sanitize_title};
