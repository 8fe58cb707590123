use crate::traits::HttpFetch;
use crate::types::{FetchConfig, IngestError, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// reqwest-backed implementation of [`HttpFetch`].
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: Arc<RwLock<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    async fn get(&self, url: &str) -> Result<Response> {
        self.apply_rate_limit(url).await?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(content_length) = response.content_length() {
            check_size(content_length as usize, self.body_limit())?;
        }

        Ok(response)
    }

    fn body_limit(&self) -> usize {
        self.config.max_body_size_mb * BYTES_PER_MB
    }

    /// Stream the body, giving up as soon as it passes the size limit.
    async fn read_body(&self, mut response: Response) -> Result<String> {
        let limit = self.body_limit();
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            append_limited(&mut body, &chunk, limit)?;
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn apply_rate_limit(&self, url: &str) -> Result<()> {
        let parsed_url = Url::parse(url)?;
        let host = parsed_url.host_str().unwrap_or("").to_string();
        let min_interval = Duration::from_millis(self.config.per_host_delay_ms);

        let wait_time = {
            let mut rate_limiter = self.rate_limiter.write().await;
            reserve_slot(&mut rate_limiter, &host, Instant::now(), min_interval)
        };

        if !wait_time.is_zero() {
            debug!("Rate limiting {}: waiting {:?}", host, wait_time);
            tokio::time::sleep(wait_time).await;
        }
        Ok(())
    }

    fn feed_backoff(&self) -> ExponentialBackoff<backoff::SystemClock> {
        let initial = Duration::from_secs(self.config.retry_delay_seconds);
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: initial * 8,
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.timeout_seconds * 4)),
            ..Default::default()
        }
    }
}

const BYTES_PER_MB: usize = 1024 * 1024;

fn check_size(bytes: usize, limit: usize) -> Result<()> {
    if bytes > limit {
        return Err(IngestError::ContentTooLarge {
            size_mb: bytes / BYTES_PER_MB,
        });
    }
    Ok(())
}

fn append_limited(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> Result<()> {
    check_size(body.len() + chunk.len(), limit)?;
    body.extend_from_slice(chunk);
    Ok(())
}

/// Book the next request slot for `host` and return how long to wait for it.
/// Hosts whose last slot is older than `min_interval` are forgotten.
fn reserve_slot(
    slots: &mut HashMap<String, Instant>,
    host: &str,
    now: Instant,
    min_interval: Duration,
) -> Duration {
    slots.retain(|_, last| now.saturating_duration_since(*last) < min_interval);

    let wait = slots
        .get(host)
        .map(|last| (*last + min_interval).saturating_duration_since(now))
        .unwrap_or_default();
    slots.insert(host.to_string(), now + wait);
    wait
}

fn is_text_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime.is_empty() || mime.starts_with("text/") || mime.contains("html") || mime.contains("xml")
}

#[async_trait]
impl HttpFetch for Fetcher {
    async fn fetch_feed(&self, url: &str) -> Result<String> {
        let start_time = Instant::now();
        let mut backoff = self.feed_backoff();
        let mut attempt = 0;

        loop {
            let result = match self.get(url).await {
                Ok(response) => self.read_body(response).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(body) => {
                    info!(
                        "Fetched feed: {} ({} bytes in {}ms)",
                        url,
                        body.len(),
                        start_time.elapsed().as_millis()
                    );
                    return Ok(body);
                }
                Err(e) => {
                    if attempt < self.config.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            attempt += 1;
                            warn!("Attempt {} failed for {}: {}, retrying in {:?}", attempt, url, e, delay);
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        debug!("Fetching page: {}", url);
        let response = self.get(url).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_text_content_type(&content_type) {
            return Err(IngestError::NonTextContent {
                content_type,
                url: url.to_string(),
            });
        }

        self.read_body(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_html_and_xml_content_types() {
        assert!(is_text_content_type("text/html; charset=utf-8"));
        assert!(is_text_content_type("application/xhtml+xml"));
        assert!(is_text_content_type("application/rss+xml"));
        assert!(is_text_content_type(""));
    }

    #[test]
    fn body_reading_stops_past_the_limit() {
        let mut body = Vec::new();
        append_limited(&mut body, &[b'a'; 6], 10).unwrap();
        append_limited(&mut body, &[b'b'; 4], 10).unwrap();
        let err = append_limited(&mut body, &[b'c'; 1], 10).unwrap_err();
        assert!(matches!(err, IngestError::ContentTooLarge { .. }));
        assert_eq!(body.len(), 10);
    }

    #[test]
    fn slots_space_requests_per_host() {
        let mut slots = HashMap::new();
        let interval = Duration::from_millis(500);
        let start = Instant::now();

        assert_eq!(reserve_slot(&mut slots, "a.test", start, interval), Duration::ZERO);
        assert_eq!(reserve_slot(&mut slots, "b.test", start, interval), Duration::ZERO);
        assert_eq!(reserve_slot(&mut slots, "a.test", start, interval), interval);
        // a third request queues behind the second
        assert_eq!(reserve_slot(&mut slots, "a.test", start, interval), interval * 2);
    }

    #[test]
    fn idle_hosts_are_pruned() {
        let mut slots = HashMap::new();
        let interval = Duration::from_millis(500);
        let start = Instant::now();
        reserve_slot(&mut slots, "old.test", start, interval);

        let later = start + Duration::from_secs(5);
        assert_eq!(reserve_slot(&mut slots, "new.test", later, interval), Duration::ZERO);
        assert!(!slots.contains_key("old.test"));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn rejects_binary_content_types() {
        assert!(!is_text_content_type("application/pdf"));
        assert!(!is_text_content_type("image/jpeg"));
        assert!(!is_text_content_type("application/octet-stream"));
    }
}
