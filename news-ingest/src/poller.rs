use crate::config::{IngestConfig, MIN_SLEEP_SECS};
use crate::extractor::ContentExtractor;
use crate::fingerprint::fingerprint;
use crate::parser::FeedParser;
use crate::resolver::SourceResolver;
use crate::sentiment::SentimentAnalyzer;
use crate::store::ArticleStore;
use crate::summarizer::Summarizer;
use crate::traits::HttpFetch;
use crate::types::{NewArticle, ParsedEntry, Result, Sentiment, StoreOutcome, MAX_TITLE_CHARS};
use crate::utils::text::{collapse_whitespace, strip_html, truncate_chars};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingUrl,
    ContentTooShort,
}

/// Result of processing a single feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOutcome {
    Stored(i64),
    Duplicate,
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedReport {
    pub feed_url: String,
    pub entries: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FeedReport {
    fn new(feed_url: &str) -> Self {
        Self {
            feed_url: feed_url.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &EntryOutcome) {
        self.entries += 1;
        match outcome {
            EntryOutcome::Stored(_) => self.stored += 1,
            EntryOutcome::Duplicate => self.duplicates += 1,
            EntryOutcome::Skipped(_) => self.skipped += 1,
            EntryOutcome::Failed(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub feeds_processed: usize,
    pub feeds_failed: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

impl CycleReport {
    fn absorb(&mut self, feed: &FeedReport) {
        self.feeds_processed += 1;
        self.stored += feed.stored;
        self.duplicates += feed.duplicates;
        self.skipped += feed.skipped;
        self.failed += feed.failed;
    }
}

/// Pause before the next cycle: what is left of the interval, but never less
/// than the minimum sleep.
pub fn next_cycle_delay(elapsed: Duration, interval: Duration) -> Duration {
    interval
        .saturating_sub(elapsed)
        .max(Duration::from_secs(MIN_SLEEP_SECS))
}

/// Periodically pulls every configured feed and stores enriched articles.
///
/// Failures are contained at the smallest unit: an entry failure yields an
/// [`EntryOutcome::Failed`], a feed failure is logged and the next feed runs,
/// and a failed or panicking cycle is logged by [`FeedPoller::run_guarded_cycle`].
pub struct FeedPoller {
    config: IngestConfig,
    store: Arc<ArticleStore>,
    fetcher: Arc<dyn HttpFetch>,
    extractor: ContentExtractor,
    resolver: SourceResolver,
    summarizer: Summarizer,
    sentiment: Arc<SentimentAnalyzer>,
}

impl FeedPoller {
    pub fn new(
        config: IngestConfig,
        store: Arc<ArticleStore>,
        fetcher: Arc<dyn HttpFetch>,
        sentiment: Arc<SentimentAnalyzer>,
    ) -> Self {
        let extractor = ContentExtractor::new(fetcher.clone());
        let resolver = SourceResolver::new(store.clone(), config.host_matching);
        Self {
            config,
            store,
            fetcher,
            extractor,
            resolver,
            summarizer: Summarizer::default(),
            sentiment,
        }
    }

    /// Run cycles until the process exits.
    pub async fn run_forever(self: Arc<Self>) {
        let interval = self.config.poll_interval();
        info!("Starting feed poller, interval {}s", interval.as_secs());

        loop {
            let started = Instant::now();
            self.run_guarded_cycle().await;

            let delay = next_cycle_delay(started.elapsed(), interval);
            debug!("Sleeping {}s until next cycle", delay.as_secs());
            tokio::time::sleep(delay).await;
        }
    }

    /// Run one cycle in its own task. Errors and panics are logged and
    /// reported as `None`.
    pub async fn run_guarded_cycle(self: &Arc<Self>) -> Option<CycleReport> {
        let poller = self.clone();
        match tokio::spawn(async move { poller.run_cycle().await }).await {
            Ok(Ok(report)) => {
                info!(
                    "Cycle finished: {} feeds ok, {} failed; {} stored, {} duplicates, {} skipped, {} failed entries",
                    report.feeds_processed,
                    report.feeds_failed,
                    report.stored,
                    report.duplicates,
                    report.skipped,
                    report.failed
                );
                Some(report)
            }
            Ok(Err(e)) => {
                error!("Cycle failed: {}", e);
                None
            }
            Err(e) => {
                error!("Cycle task aborted: {}", e);
                None
            }
        }
    }

    /// One pass over every effective feed.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started = Instant::now();
        self.seed_default_sources().await;

        let feeds = self.config.effective_feeds();
        info!("Polling {} feeds", feeds.len());

        let mut report = CycleReport::default();
        for feed_url in &feeds {
            match self.process_feed(feed_url).await {
                Ok(feed) => {
                    info!(
                        "Feed {}: {} entries, {} stored, {} duplicates, {} skipped, {} failed",
                        feed.feed_url, feed.entries, feed.stored, feed.duplicates, feed.skipped, feed.failed
                    );
                    report.absorb(&feed);
                }
                Err(e) => {
                    error!("Failed to process feed {}: {}", feed_url, e);
                    report.feeds_failed += 1;
                }
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    async fn seed_default_sources(&self) {
        for source in &self.config.default_sources {
            if let Err(e) = self
                .store
                .upsert_source(source.name, source.base_url, Some(source.rss_url))
                .await
            {
                error!("Failed to seed source {}: {}", source.name, e);
            }
        }
    }

    /// Fetch, parse and process the first `max_items_per_feed` entries of one feed.
    pub async fn process_feed(&self, feed_url: &str) -> Result<FeedReport> {
        let body = self.fetcher.fetch_feed(feed_url).await?;
        let parsed = FeedParser::parse_feed(&body)?;
        debug!(
            "Parsed {} entries from {} ({})",
            parsed.entries.len(),
            feed_url,
            parsed.title.as_deref().unwrap_or("untitled")
        );

        let mut report = FeedReport::new(feed_url);
        for entry in parsed.entries.iter().take(self.config.max_items_per_feed) {
            let outcome = self.process_entry(feed_url, entry).await;
            if let EntryOutcome::Failed(reason) = &outcome {
                warn!("Entry {} failed: {}", entry.link.as_deref().unwrap_or("?"), reason);
            }
            report.record(&outcome);
        }
        Ok(report)
    }

    /// Resolve, extract, summarize, classify and store one entry.
    pub async fn process_entry(&self, feed_url: &str, entry: &ParsedEntry) -> EntryOutcome {
        let Some(url) = entry.link.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            debug!("Skipping entry without link in {}", feed_url);
            return EntryOutcome::Skipped(SkipReason::MissingUrl);
        };
        let url_hash = fingerprint(url);

        match self.store.contains_fingerprint(&url_hash).await {
            Ok(true) => return EntryOutcome::Duplicate,
            Ok(false) => {}
            Err(e) => return EntryOutcome::Failed(format!("existence check: {}", e)),
        }

        let source = match self.resolver.resolve(feed_url, url).await {
            Ok(source) => source,
            Err(e) => return EntryOutcome::Failed(format!("source resolution: {}", e)),
        };

        let text = match self.extractor.extract(url).await {
            Some(text) => text,
            None => feed_text(entry),
        };
        if text.trim().chars().count() < self.config.min_content_chars {
            debug!("Skipping {}: content too short", url);
            return EntryOutcome::Skipped(SkipReason::ContentTooShort);
        }

        let (text, summary, sentiment) = match self.enrich(text).await {
            Ok(enriched) => enriched,
            Err(e) => return EntryOutcome::Failed(format!("enrichment: {}", e)),
        };

        let title = entry
            .title
            .as_deref()
            .map(collapse_whitespace)
            .unwrap_or_default();
        let article = NewArticle {
            source_id: source.id,
            title: truncate_chars(&title, MAX_TITLE_CHARS),
            url: url.to_string(),
            url_hash,
            published_at: entry.published(),
            full_text: text,
            summary,
            sentiment: Some(sentiment),
            meta: serde_json::json!({ "feed": feed_url }),
        };

        match self.store.store_if_absent(&article).await {
            StoreOutcome::Stored(id) => {
                info!("Stored article: {} ({})", article.title, id);
                EntryOutcome::Stored(id)
            }
            StoreOutcome::Duplicate => EntryOutcome::Duplicate,
            StoreOutcome::Failed(reason) => EntryOutcome::Failed(reason),
        }
    }

    /// Summary and sentiment label, computed off the async workers.
    async fn enrich(
        &self,
        text: String,
    ) -> std::result::Result<(String, Option<String>, Sentiment), tokio::task::JoinError> {
        let summarizer = self.summarizer.clone();
        let analyzer = self.sentiment.clone();
        let sentences = self.config.summary_sentences;

        tokio::task::spawn_blocking(move || {
            let summary = summarizer.summarize(&text, sentences);
            let summary = Some(summary).filter(|s| !s.trim().is_empty());
            let basis = summary.as_deref().unwrap_or(text.as_str());
            let sentiment = analyzer.classify(basis);
            (text, summary, sentiment)
        })
        .await
    }
}

/// Plain text carried by the feed itself, used when the page yields nothing.
fn feed_text(entry: &ParsedEntry) -> String {
    entry
        .content
        .as_deref()
        .or(entry.summary.as_deref())
        .map(strip_html)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_text_prefers_content_over_summary() {
        let entry = ParsedEntry {
            summary: Some("<p>short</p>".to_string()),
            content: Some("<div>full <b>body</b></div>".to_string()),
            ..ParsedEntry::default()
        };
        assert_eq!(feed_text(&entry), "full body");
        assert_eq!(feed_text(&ParsedEntry::default()), "");
    }

    #[test]
    fn report_tallies_outcomes() {
        let mut feed = FeedReport::new("https://example.com/rss");
        feed.record(&EntryOutcome::Stored(1));
        feed.record(&EntryOutcome::Duplicate);
        feed.record(&EntryOutcome::Skipped(SkipReason::MissingUrl));
        feed.record(&EntryOutcome::Failed("boom".to_string()));

        let mut cycle = CycleReport::default();
        cycle.absorb(&feed);
        assert_eq!(feed.entries, 4);
        assert_eq!((cycle.stored, cycle.duplicates, cycle.skipped, cycle.failed), (1, 1, 1, 1));
        assert_eq!(cycle.feeds_processed, 1);
    }
}
