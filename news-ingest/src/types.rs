use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest title kept on an article, in characters.
pub const MAX_TITLE_CHARS: usize = 800;

/// A publication that articles are attributed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    pub rss_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Label a compound polarity score. Both thresholds are inclusive.
    pub fn from_compound(score: f64) -> Self {
        if score >= 0.05 {
            Sentiment::Positive
        } else if score <= -0.05 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(IngestError::General(format!("Unknown sentiment label: {}", other))),
        }
    }
}

/// A fully enriched article ready to be written. The fingerprint is already computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub url_hash: String,
    pub published_at: Option<DateTime<Utc>>,
    pub full_text: String,
    pub summary: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub meta: serde_json::Value,
}

/// A stored article row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub url_hash: String,
    pub published_at: Option<DateTime<Utc>>,
    pub full_text: Option<String>,
    pub summary: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Filters accepted by the read side of the store.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub keyword: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub source_id: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored(i64),
    Duplicate,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_body_size_mb: usize,
    pub max_redirects: usize,
    pub per_host_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "news-ingest/0.1".to_string(),
            timeout_seconds: 20,
            connect_timeout_seconds: 10,
            max_retries: 1,
            retry_delay_seconds: 2,
            max_body_size_mb: 10,
            max_redirects: 5,
            per_host_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedEntry {
    pub link: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ParsedEntry {
    pub fn published(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.updated_at)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Non-text content ({content_type}) at {url}")]
    NonTextContent { content_type: String, url: String },

    #[error("Content size exceeds limit: {size_mb}MB")]
    ContentTooLarge { size_mb: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
