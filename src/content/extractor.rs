use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use super::sanitize::{escape_attr, sanitize_html, sanitize_title};
use crate::model::{Article, FeedConfig, RawFeedItem};
use crate::util::validate_url;

/// First `<img ... src="...">` in raw markup. Matches malformed HTML too.
static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+src=["'](.*?)["']"#).expect("IMG_SRC is a valid pattern")
});

/// Body used when an item carries neither content nor description.
pub fn placeholder_html(link: &str) -> String {
    format!(
        "Full content not available. <a href=\"{}\" target=\"_blank\">See the original article</a>.",
        escape_attr(link)
    )
}

/// Paragraph appended to every published body, linking back to the source.
pub fn attribution_html(link: &str) -> String {
    format!(
        "<p><em>Note: this article was imported from <a href=\"{}\" target=\"_blank\">this site</a>.</em></p>",
        escape_attr(link)
    )
}

/// Builds publishable [`Article`]s from feed items.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Converts one feed item into an article.
    ///
    /// Body fallback chain, first non-blank wins: `content`, `description`,
    /// then a placeholder linking to the item. The chosen body is sanitized.
    /// The cover image is the enclosure link when it is a valid URL, else the
    /// first `<img src>` in the unsanitized body.
    pub fn extract(&self, item: &RawFeedItem, feed: &FeedConfig) -> Article {
        let source_link = canonical_link(&item.link, &feed.url);

        let raw_body = non_blank(item.content.as_deref())
            .or_else(|| non_blank(item.description.as_deref()))
            .map(str::to_owned)
            .unwrap_or_else(|| placeholder_html(&source_link));

        let cover_image_url = resolve_cover_image(item.enclosure_link.as_deref(), &raw_body);

        Article {
            title: sanitize_title(&item.title),
            body_html: sanitize_html(&raw_body),
            source_link,
            category_id: coerce_category(feed.category_id),
            cover_image_url,
        }
    }
}

/// Negative category ids collapse to 0 ("uncategorized").
pub fn coerce_category(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

/// Cover image: a valid enclosure link wins over the first body image.
pub fn resolve_cover_image(enclosure: Option<&str>, raw_body: &str) -> Option<String> {
    if let Some(link) = enclosure {
        if validate_url(link).is_ok() {
            return Some(link.trim().to_string());
        }
    }
    first_image_src(raw_body)
}

/// The `src` of the first `<img>` tag in `html`, if any.
pub fn first_image_src(html: &str) -> Option<String> {
    IMG_SRC
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|src| !src.is_empty())
        .map(str::to_owned)
}

/// Absolute http(s) form of the item link. Relative links are resolved
/// against the feed URL; anything unusable becomes an empty string.
fn canonical_link(link: &str, feed_url: &str) -> String {
    if let Ok(url) = validate_url(link) {
        return url.to_string();
    }
    let link = link.trim();
    if link.is_empty() {
        return String::new();
    }
    Url::parse(feed_url.trim())
        .and_then(|base| base.join(link))
        .ok()
        .filter(|url| validate_url(url.as_str()).is_ok())
        .map(|url| url.to_string())
        .unwrap_or_default()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
