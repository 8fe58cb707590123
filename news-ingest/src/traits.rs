use crate::types::Result;
use async_trait::async_trait;

/// Network seam used by the poller and the content extractor.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Fetch the raw body of a syndication feed. Implementations may retry.
    async fn fetch_feed(&self, url: &str) -> Result<String>;

    /// Fetch an article page as text. Implementations must not retry and
    /// should reject non-text responses.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}
