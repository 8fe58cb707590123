pub mod api;
pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod fingerprint;
pub mod parser;
pub mod poller;
pub mod resolver;
pub mod sentiment;
pub mod store;
pub mod summarizer;
pub mod traits;
pub mod types;
pub mod utils;

pub use config::{ConfigArgs, IngestConfig};
pub use extractor::ContentExtractor;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use poller::{CycleReport, EntryOutcome, FeedPoller, FeedReport, SkipReason};
pub use resolver::{HostMatching, SourceResolver};
pub use sentiment::SentimentAnalyzer;
pub use store::ArticleStore;
pub use summarizer::Summarizer;
pub use traits::HttpFetch;
pub use types::*;
