use crate::resolver::HostMatching;
use crate::summarizer::DEFAULT_SENTENCES;
use crate::types::FetchConfig;
use crate::utils::url::is_http_url;
use clap::Args;
use std::time::Duration;
use tracing::warn;

/// Cycles never start more often than this.
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Shortest pause between two cycles, even when a cycle overran the interval.
pub const MIN_SLEEP_SECS: u64 = 5;

/// Texts shorter than this (in characters) are never stored.
pub const DEFAULT_MIN_CONTENT_CHARS: usize = 200;

/// A publication that is seeded on every cycle.
#[derive(Debug, Clone, Copy)]
pub struct DefaultSource {
    pub name: &'static str,
    pub base_url: &'static str,
    pub rss_url: &'static str,
}

pub const DEFAULT_SOURCES: &[DefaultSource] = &[
    DefaultSource {
        name: "BBC",
        base_url: "https://www.bbc.co.uk",
        rss_url: "https://feeds.bbci.co.uk/news/rss.xml",
    },
    DefaultSource {
        name: "CNN",
        base_url: "https://www.cnn.com",
        rss_url: "https://rss.cnn.com/rss/edition.rss",
    },
];

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub database_url: String,
    /// Explicit feed list; when empty the default sources' feeds are polled.
    pub feeds: Vec<String>,
    pub interval_secs: u64,
    pub max_items_per_feed: usize,
    pub summary_sentences: usize,
    pub min_content_chars: usize,
    pub host_matching: HostMatching,
    pub default_sources: Vec<DefaultSource>,
    pub fetch: FetchConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://news.db".to_string(),
            feeds: Vec::new(),
            interval_secs: 900,
            max_items_per_feed: 20,
            summary_sentences: DEFAULT_SENTENCES,
            min_content_chars: DEFAULT_MIN_CONTENT_CHARS,
            host_matching: HostMatching::Exact,
            default_sources: DEFAULT_SOURCES.to_vec(),
            fetch: FetchConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Feeds polled each cycle: the explicit list, else the default sources' feeds.
    pub fn effective_feeds(&self) -> Vec<String> {
        let explicit: Vec<String> = self
            .feeds
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .filter(|f| {
                let valid = is_http_url(f);
                if !valid {
                    warn!("Ignoring feed with unsupported URL: {}", f);
                }
                valid
            })
            .collect();
        if !explicit.is_empty() {
            return explicit;
        }
        self.default_sources.iter().map(|s| s.rss_url.to_string()).collect()
    }

    /// Configured interval, never below [`MIN_INTERVAL_SECS`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(MIN_INTERVAL_SECS))
    }
}

/// Command line and environment settings for the ingestion pipeline.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Data store connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://news.db")]
    pub database_url: String,

    /// Comma separated feed URLs; defaults to the built-in sources
    #[arg(long, env = "FEEDS", value_delimiter = ',')]
    pub feeds: Vec<String>,

    /// Seconds between cycle starts (at least 60)
    #[arg(long, env = "FETCH_INTERVAL_SECONDS", default_value_t = 900)]
    pub interval_secs: u64,

    #[arg(long, env = "MAX_ITEMS_PER_FEED", default_value_t = 20)]
    pub max_items_per_feed: usize,

    #[arg(long, env = "SUMMARY_SENTENCES", default_value_t = DEFAULT_SENTENCES)]
    pub summary_sentences: usize,

    #[arg(long, env = "MIN_CONTENT_CHARS", default_value_t = DEFAULT_MIN_CONTENT_CHARS)]
    pub min_content_chars: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECONDS", default_value_t = 20)]
    pub timeout_secs: u64,

    #[arg(long, env = "SOURCE_HOST_MATCHING", value_enum, default_value_t = HostMatching::Exact)]
    pub host_matching: HostMatching,
}

impl ConfigArgs {
    pub fn into_config(self) -> IngestConfig {
        let defaults = IngestConfig::default();
        IngestConfig {
            database_url: self.database_url,
            feeds: self.feeds,
            interval_secs: self.interval_secs,
            max_items_per_feed: self.max_items_per_feed,
            summary_sentences: self.summary_sentences,
            min_content_chars: self.min_content_chars,
            host_matching: self.host_matching,
            fetch: FetchConfig {
                timeout_seconds: self.timeout_secs.max(1),
                ..defaults.fetch
            },
            ..defaults
        }
    }
}
