use crate::types::{IngestError, ParsedEntry, ParsedFeed, Result};
use chrono::Utc;
use feed_rs::parser;
use std::collections::HashSet;
use tracing::debug;

pub struct FeedParser;

impl FeedParser {
    /// Parse an RSS or Atom document. Entries repeating an already seen link
    /// within the same document are dropped.
    pub fn parse_feed(content: &str) -> Result<ParsedFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| IngestError::Parse(format!("Failed to parse feed: {}", e)))?;

        let title = feed.title.map(|t| t.content);
        let mut seen_links = HashSet::new();
        let mut entries = Vec::with_capacity(feed.entries.len());

        for entry in feed.entries {
            let parsed = Self::parse_entry(entry);
            if let Some(link) = &parsed.link {
                if !seen_links.insert(link.clone()) {
                    debug!("Skipping repeated entry with link: {}", link);
                    continue;
                }
            }
            entries.push(parsed);
        }

        debug!("Parsed feed with {} entries", entries.len());
        Ok(ParsedFeed { title, entries })
    }

    fn parse_entry(entry: feed_rs::model::Entry) -> ParsedEntry {
        let link = entry
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .filter(|href| !href.is_empty());

        ParsedEntry {
            link,
            title: entry.title.map(|t| t.content),
            summary: entry.summary.map(|s| s.content),
            content: entry.content.and_then(|c| c.body),
            published_at: entry.published.map(|dt| dt.with_timezone(&Utc)),
            updated_at: entry.updated.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}
