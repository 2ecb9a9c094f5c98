use feed_rs::model::{Entry, Link};
use feed_rs::parser;

use crate::model::{ParsedFeed, RawFeedItem};

/// Parses RSS/Atom/JSON Feed bytes into a [`ParsedFeed`], keeping entries in
/// document order.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let items = feed.entries.into_iter().map(into_raw_item).collect();

    Ok(ParsedFeed {
        title: feed.title.map(|t| t.content),
        items,
    })
}

fn into_raw_item(entry: Entry) -> RawFeedItem {
    let link = pick_link(&entry.links).unwrap_or_default();

    // RSS <enclosure> and Media RSS <media:content> both land in `media`
    let enclosure_link = entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .find_map(|c| c.url.as_ref().map(|u| u.to_string()));

    RawFeedItem {
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        content: entry.content.and_then(|c| c.body),
        description: entry.summary.map(|s| s.content),
        link,
        enclosure_link,
    }
}

/// Prefers the `alternate` link (Atom's permalink), else the first one.
fn pick_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}
