use crate::traits::HttpFetch;
use crate::utils::text::collapse_whitespace;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};

static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").expect("valid selector"));
static MAIN: Lazy<Selector> =
    Lazy::new(|| Selector::parse("main, [role='main']").expect("valid selector"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid selector"));

/// Elements whose text never counts as article content.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "template",
];

/// Fetches article pages and pulls out their readable text.
pub struct ContentExtractor {
    fetcher: Arc<dyn HttpFetch>,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn HttpFetch>) -> Self {
        Self { fetcher }
    }

    /// Best-effort main text of the page at `url`. Every failure is logged and
    /// reported as `None`; nothing is retried.
    pub async fn extract(&self, url: &str) -> Option<String> {
        let html = match self.fetcher.fetch_page(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Content extraction failed for {}: {}", url, e);
                return None;
            }
        };

        let text = extract_main_text(&html);
        if text.is_none() {
            warn!("No readable content found at {}", url);
        }
        text
    }
}

/// Main readable text of an HTML document, paragraphs separated by newlines.
pub fn extract_main_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let best_article = document
        .select(&ARTICLE)
        .map(paragraph_text)
        .max_by_key(|text| text.len())
        .filter(|text| !text.is_empty());
    if let Some(text) = best_article {
        debug!("Extracted {} chars from <article>", text.len());
        return Some(text);
    }

    if let Some(text) = document
        .select(&MAIN)
        .map(paragraph_text)
        .find(|text| !text.is_empty())
    {
        return Some(text);
    }

    let paragraphs = join_paragraphs(document.select(&PARAGRAPH));
    if !paragraphs.is_empty() {
        return Some(paragraphs);
    }

    document
        .select(&BODY)
        .next()
        .map(visible_text)
        .filter(|text| !text.is_empty())
}

fn paragraph_text(container: ElementRef<'_>) -> String {
    join_paragraphs(container.select(&PARAGRAPH))
}

fn join_paragraphs<'a>(paragraphs: impl Iterator<Item = ElementRef<'a>>) -> String {
    paragraphs
        .filter(|p| !is_inside_skipped(*p))
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_inside_skipped(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| SKIPPED_ELEMENTS.contains(&ancestor.value().name()))
}

/// Text of every node under `root` that is not inside a skipped element.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut pieces = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| SKIPPED_ELEMENTS.contains(&ancestor.value().name()));
        if !hidden {
            let trimmed = collapse_whitespace(text);
            if !trimmed.is_empty() {
                pieces.push(trimmed);
            }
        }
    }
    pieces.join(" ")
}
