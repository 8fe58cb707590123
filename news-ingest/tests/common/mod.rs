#![allow(dead_code)]

use async_trait::async_trait;
use news_ingest::{ArticleStore, HttpFetch, IngestError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

pub async fn memory_store() -> Result<Arc<ArticleStore>> {
    Ok(Arc::new(ArticleStore::connect("sqlite::memory:").await?))
}

/// Serves canned feed and page bodies; unknown URLs answer 404.
#[derive(Default)]
pub struct StaticFetcher {
    feeds: HashMap<String, String>,
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: &str, body: &str) -> Self {
        self.feeds.insert(url.to_string(), body.to_string());
        self
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

fn not_found(url: &str) -> IngestError {
    IngestError::HttpStatus {
        status: 404,
        url: url.to_string(),
    }
}

#[async_trait]
impl HttpFetch for StaticFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<String> {
        self.feeds.get(url).cloned().ok_or_else(|| not_found(url))
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.pages.get(url).cloned().ok_or_else(|| not_found(url))
    }
}

pub struct Item<'a> {
    pub title: &'a str,
    pub link: Option<&'a str>,
    pub description: &'a str,
}

/// Minimal RSS 2.0 document with the given items.
pub fn rss(items: &[Item<'_>]) -> String {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Test feed</title><link>https://example.com</link><description>Test</description>"#,
    );
    for item in items {
        body.push_str("<item>");
        body.push_str(&format!("<title>{}</title>", item.title));
        if let Some(link) = item.link {
            body.push_str(&format!("<link>{}</link>", link));
        }
        body.push_str(&format!("<description>{}</description>", item.description));
        body.push_str("<pubDate>Tue, 10 Jun 2025 04:00:00 GMT</pubDate>");
        body.push_str("</item>");
    }
    body.push_str("</channel></rss>");
    body
}

const STORY: &[&str] = &[
    "The city council approved a new riverside park on Monday after months of debate.",
    "Residents celebrated the decision and praised the planning team for its excellent work.",
    "The park will include playgrounds, walking trails and a community garden.",
    "Construction is expected to begin in the spring and finish within two years.",
    "Local businesses welcomed the plan and expect more visitors to the riverside district.",
    "Council members said the project would improve safety and support healthy living.",
    "Funding comes from a regional grant and a small share of the city budget.",
];

/// Plain article text of at least `min_chars` characters built from real sentences.
pub fn story_text(min_chars: usize) -> String {
    let mut text = String::new();
    let mut i = 0;
    while text.chars().count() < min_chars {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(STORY[i % STORY.len()]);
        i += 1;
    }
    text
}

/// An article page wrapping `text` in paragraphs.
pub fn article_page(text: &str) -> String {
    let paragraphs: String = text
        .split(". ")
        .map(|p| format!("<p>{}</p>", p))
        .collect();
    format!(
        "<html><head><title>Story</title></head><body><nav><p>Home</p></nav><article>{}</article></body></html>",
        paragraphs
    )
}
