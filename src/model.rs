//! Domain types shared by the fetcher, extractor, pipeline and stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Identifier of a published article in the content store.
pub type ArticleId = i64;

/// One configured feed slot.
///
/// `category_id` is an opaque foreign key into the publishing target's
/// categories; it is carried through untouched until the extractor coerces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default, deserialize_with = "crate::config::trimmed_url")]
    pub url: String,
    #[serde(
        default,
        rename = "category",
        deserialize_with = "crate::config::lenient_category"
    )]
    pub category_id: i64,
}

impl FeedConfig {
    pub fn new(url: impl Into<String>, category_id: i64) -> Self {
        Self {
            url: url.into(),
            category_id,
        }
    }
}

/// How often the scheduled import runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "6hours")]
    Every6Hours,
    #[serde(rename = "12hours")]
    Every12Hours,
    #[default]
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "2days")]
    Every2Days,
    #[serde(rename = "weekly")]
    Weekly,
}

impl Frequency {
    pub const ALL: [Frequency; 5] = [
        Frequency::Every6Hours,
        Frequency::Every12Hours,
        Frequency::Daily,
        Frequency::Every2Days,
        Frequency::Weekly,
    ];

    /// Recurrence interval of the scheduled job.
    pub fn interval(self) -> Duration {
        const HOUR: u64 = 60 * 60;
        let hours = match self {
            Frequency::Every6Hours => 6,
            Frequency::Every12Hours => 12,
            Frequency::Daily => 24,
            Frequency::Every2Days => 48,
            Frequency::Weekly => 24 * 7,
        };
        Duration::from_secs(hours * HOUR)
    }

    /// Configuration key for this frequency.
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Every6Hours => "6hours",
            Frequency::Every12Hours => "12hours",
            Frequency::Daily => "daily",
            Frequency::Every2Days => "2days",
            Frequency::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| format!("unknown frequency '{s}' (expected 6hours, 12hours, daily, 2days or weekly)"))
    }
}

/// A feed entry reduced to the fields the importer looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedItem {
    pub title: String,
    pub content: Option<String>,
    pub description: Option<String>,
    pub link: String,
    pub enclosure_link: Option<String>,
}

/// A fetched feed. Items keep the document order, which for nearly every
/// publisher is newest first.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub items: Vec<RawFeedItem>,
}

impl ParsedFeed {
    /// The one item a run imports: the first in feed order.
    pub fn newest(&self) -> Option<&RawFeedItem> {
        self.items.first()
    }
}

/// A publish-ready article built from one feed item.
///
/// `body_html` holds the sanitized item body only. The attribution paragraph
/// is added by [`Article::rendered_html`], which is what gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub title: String,
    pub body_html: String,
    pub source_link: String,
    pub category_id: u64,
    pub cover_image_url: Option<String>,
}

impl Article {
    /// Body followed by the "imported from" attribution paragraph.
    pub fn rendered_html(&self) -> String {
        let mut html = String::with_capacity(self.body_html.len() + 160);
        html.push_str(&self.body_html);
        html.push_str(&crate::content::attribution_html(&self.source_link));
        html
    }
}

/// Search/discovery metadata attached to a published article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeoMetadata {
    pub short_title: String,
    pub short_description: String,
    pub keyphrase: String,
}

/// Who published an article and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishContext {
    pub author_id: i64,
    pub published_at: DateTime<Utc>,
}
