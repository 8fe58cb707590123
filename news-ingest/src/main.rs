use anyhow::Context;
use clap::{Parser, Subcommand};
use news_ingest::api::{self, AppState};
use news_ingest::{
    ArticleQuery, ArticleStore, ConfigArgs, FeedPoller, Fetcher, HttpFetch, Sentiment,
    SentimentAnalyzer,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Polls news feeds and stores summarized, sentiment-labelled articles.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll all feeds forever
    Run,
    /// Poll all feeds in the background and serve the read API
    Serve {
        /// Address the HTTP server listens on
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
        bind: String,
    },
    /// Run a single cycle and print its report as JSON
    Once,
    /// List known sources as JSON lines
    Sources,
    /// List stored articles as JSON lines, newest first
    Articles {
        /// Case-insensitive title keyword
        #[arg(long)]
        q: Option<String>,

        /// positive, neutral or negative
        #[arg(long)]
        sentiment: Option<String>,

        #[arg(long)]
        source_id: Option<i64>,

        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.config.into_config();

    let store = Arc::new(
        ArticleStore::connect(&config.database_url)
            .await
            .with_context(|| format!("connecting to {}", config.database_url))?,
    );

    match cli.command {
        Command::Run => {
            let poller = Arc::new(build_poller(config, store.clone())?);
            poller.run_forever().await;
        }
        Command::Serve { bind } => {
            let poller = Arc::new(build_poller(config, store.clone())?);
            let ingest = tokio::spawn(poller.run_forever());

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("binding {}", bind))?;
            info!("Serving read API on {}", bind);
            let served = axum::serve(listener, api::router(AppState::new(store.clone()))).await;
            ingest.abort();
            served?;
        }
        Command::Once => {
            let poller = build_poller(config, store.clone())?;
            let report = poller.run_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Sources => {
            for source in store.list_sources().await? {
                println!("{}", serde_json::to_string(&source)?);
            }
        }
        Command::Articles {
            q,
            sentiment,
            source_id,
            limit,
        } => {
            let query = ArticleQuery {
                keyword: q,
                sentiment: sentiment.as_deref().map(str::parse::<Sentiment>).transpose()?,
                source_id,
                limit,
            };
            for article in store.list_articles(&query).await? {
                println!("{}", serde_json::to_string(&article)?);
            }
        }
    }

    store.close().await;
    Ok(())
}

fn build_poller(
    config: news_ingest::IngestConfig,
    store: Arc<ArticleStore>,
) -> anyhow::Result<FeedPoller> {
    let fetcher: Arc<dyn HttpFetch> = Arc::new(Fetcher::new(config.fetch.clone())?);
    let sentiment = Arc::new(SentimentAnalyzer::new());
    info!(
        "Configured {} feeds, {} items per feed, {} summary sentences",
        config.effective_feeds().len(),
        config.max_items_per_feed,
        config.summary_sentences
    );
    Ok(FeedPoller::new(config, store, fetcher, sentiment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_article_filters() {
        let cli = Cli::parse_from([
            "news-ingest",
            "articles",
            "--q",
            "rates",
            "--sentiment",
            "negative",
            "--limit",
            "5",
        ]);
        match cli.command {
            Command::Articles { q, sentiment, limit, source_id } => {
                assert_eq!(q.as_deref(), Some("rates"));
                assert_eq!(sentiment.as_deref(), Some("negative"));
                assert_eq!(limit, Some(5));
                assert_eq!(source_id, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parses_serve_bind_address() {
        let cli = Cli::parse_from(["news-ingest", "serve", "--bind", "127.0.0.1:9000"]);
        match cli.command {
            Command::Serve { bind } => assert_eq!(bind, "127.0.0.1:9000"),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
