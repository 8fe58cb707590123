use crate::store::ArticleStore;
use crate::types::{Result, Source};
use crate::utils::url::{bare_host, host_of};
use clap::ValueEnum;
use std::sync::Arc;
use tracing::debug;

/// How an article host is compared against known source base URLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum HostMatching {
    /// Hosts must be equal, ignoring case and a leading `www.`.
    #[default]
    Exact,
    /// The base URL only has to contain the host. Can attribute articles to
    /// the wrong publication when host names overlap.
    Contains,
}

/// Maps a feed entry to the publication that owns it.
pub struct SourceResolver {
    store: Arc<ArticleStore>,
    host_matching: HostMatching,
}

impl SourceResolver {
    pub fn new(store: Arc<ArticleStore>, host_matching: HostMatching) -> Self {
        Self { store, host_matching }
    }

    /// Resolve by feed URL, then by article host, else create a new source.
    pub async fn resolve(&self, feed_url: &str, article_url: &str) -> Result<Source> {
        if let Some(source) = self.store.find_source_by_feed_url(feed_url).await? {
            return Ok(source);
        }

        let host = host_of(article_url);
        if let Some(host) = host.as_deref() {
            if let Some(source) = self.find_by_host(host).await? {
                debug!("Resolved {} to source {} by host", article_url, source.name);
                return Ok(source);
            }
        }

        let (name, base_url) = match host {
            Some(host) => (host.clone(), format!("https://{}", host)),
            None => ("unknown".to_string(), article_url.trim().to_string()),
        };
        self.store.upsert_source(&name, &base_url, Some(feed_url)).await
    }

    async fn find_by_host(&self, host: &str) -> Result<Option<Source>> {
        let sources = self.store.list_sources().await?;
        let found = sources.into_iter().find(|source| match self.host_matching {
            HostMatching::Exact => host_of(&source.base_url)
                .map(|known| bare_host(&known) == bare_host(host))
                .unwrap_or(false),
            HostMatching::Contains => source.base_url.contains(host),
        });
        Ok(found)
    }
}
