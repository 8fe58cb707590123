use crate::types::{
    Article, ArticleQuery, IngestError, NewArticle, Result, Sentiment, Source, StoreOutcome,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use tracing::{debug, error, info};

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        base_url TEXT NOT NULL UNIQUE,
        rss_url TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id INTEGER NOT NULL REFERENCES sources(id),
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        url_hash TEXT NOT NULL,
        published_at TEXT,
        full_text TEXT,
        summary TEXT,
        sentiment TEXT CHECK (sentiment IN ('positive', 'neutral', 'negative')),
        meta TEXT,
        created_at TEXT NOT NULL,
        CONSTRAINT uq_articles_url_hash UNIQUE (url_hash)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_recency ON articles (published_at DESC, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_articles_source ON articles (source_id)",
];

const ARTICLE_COLUMNS: &str =
    "id, source_id, title, url, url_hash, published_at, full_text, summary, sentiment, meta, created_at";

/// Durable store of sources and articles.
///
/// The poller is the only writer. Article uniqueness is enforced by the
/// `url_hash` constraint; `store_if_absent` checks before inserting and treats
/// a constraint violation on insert as a duplicate, so a lost race between
/// the check and the insert never surfaces as an error.
pub struct ArticleStore {
    db: SqlitePool,
}

impl ArticleStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database is a separate database.
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { db: pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.db).await?;
        }
        Ok(())
    }

    /// Return the source with this base URL, creating it if absent.
    pub async fn upsert_source(&self, name: &str, base_url: &str, rss_url: Option<&str>) -> Result<Source> {
        if let Some(existing) = self.find_source_by_base_url(base_url).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO sources (name, base_url, rss_url, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(base_url)
        .bind(rss_url)
        .bind(now)
        .execute(&self.db)
        .await;

        match inserted {
            Ok(result) => {
                info!("Added new source: {} ({})", name, base_url);
                Ok(Source {
                    id: result.last_insert_rowid(),
                    name: name.to_string(),
                    base_url: base_url.to_string(),
                    rss_url: rss_url.map(str::to_string),
                    created_at: now,
                })
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!("Source {} was created concurrently, reading it back", base_url);
                self.find_source_by_base_url(base_url)
                    .await?
                    .ok_or_else(|| IngestError::General(format!("Source vanished: {}", base_url)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_source_by_base_url(&self, base_url: &str) -> Result<Option<Source>> {
        let row = sqlx::query("SELECT * FROM sources WHERE base_url = ? LIMIT 1")
            .bind(base_url)
            .fetch_optional(&self.db)
            .await?;
        row.map(|r| source_from_row(&r)).transpose()
    }

    pub async fn find_source_by_feed_url(&self, feed_url: &str) -> Result<Option<Source>> {
        let row = sqlx::query("SELECT * FROM sources WHERE rss_url = ? ORDER BY id LIMIT 1")
            .bind(feed_url)
            .fetch_optional(&self.db)
            .await?;
        row.map(|r| source_from_row(&r)).transpose()
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources ORDER BY id")
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(source_from_row).collect()
    }

    pub async fn contains_fingerprint(&self, url_hash: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM articles WHERE url_hash = ?")
            .bind(url_hash)
            .fetch_one(&self.db)
            .await?;
        Ok(row.try_get::<i64, _>("count")? > 0)
    }

    /// Insert the article unless one with the same fingerprint exists.
    pub async fn store_if_absent(&self, article: &NewArticle) -> StoreOutcome {
        match self.contains_fingerprint(&article.url_hash).await {
            Ok(true) => return StoreOutcome::Duplicate,
            Ok(false) => {}
            Err(e) => {
                error!("Existence check failed for {}: {}", article.url, e);
                return StoreOutcome::Failed(e.to_string());
            }
        }

        self.insert_or_classify(article).await
    }

    /// Insert without the existence check. A fingerprint conflict is a
    /// duplicate; any other write error is a failure.
    async fn insert_or_classify(&self, article: &NewArticle) -> StoreOutcome {
        match self.insert_article(article).await {
            Ok(id) => StoreOutcome::Stored(id),
            Err(IngestError::Database(sqlx::Error::Database(db_err))) if db_err.is_unique_violation() => {
                debug!("Fingerprint conflict on insert for {}, treating as duplicate", article.url);
                StoreOutcome::Duplicate
            }
            Err(e) => {
                error!("DB insert failed for {}: {}", article.url, e);
                StoreOutcome::Failed(e.to_string())
            }
        }
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<i64> {
        let meta = serde_json::to_string(&article.meta)?;
        let result = sqlx::query(
            r#"
            INSERT INTO articles (source_id, title, url, url_hash, published_at, full_text, summary, sentiment, meta, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(article.source_id)
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.url_hash)
        .bind(article.published_at)
        .bind(&article.full_text)
        .bind(&article.summary)
        .bind(article.sentiment.map(|s| s.as_str()))
        .bind(meta)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_article_by_fingerprint(&self, url_hash: &str) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE url_hash = ?", ARTICLE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(url_hash)
            .fetch_optional(&self.db)
            .await?;
        row.map(|r| article_from_row(&r)).transpose()
    }

    pub async fn count_articles(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM articles")
            .fetch_one(&self.db)
            .await?;
        Ok(row.try_get("count")?)
    }

    /// Most recent articles matching the query, newest first.
    pub async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM articles WHERE 1 = 1", ARTICLE_COLUMNS));

        if let Some(keyword) = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            builder
                .push(" AND title LIKE ")
                .push_bind(format!("%{}%", escape_like(keyword)))
                .push(" ESCAPE '\\'");
        }
        if let Some(sentiment) = query.sentiment {
            builder.push(" AND sentiment = ").push_bind(sentiment.as_str());
        }
        if let Some(source_id) = query.source_id {
            builder.push(" AND source_id = ").push_bind(source_id);
        }
        builder
            .push(" ORDER BY published_at DESC, id DESC LIMIT ")
            .push_bind(limit as i64);

        let rows = builder.build().fetch_all(&self.db).await?;
        rows.iter().map(article_from_row).collect()
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn source_from_row(row: &SqliteRow) -> Result<Source> {
    Ok(Source {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        base_url: row.try_get("base_url")?,
        rss_url: row.try_get("rss_url")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let sentiment = row
        .try_get::<Option<String>, _>("sentiment")?
        .map(|s| Sentiment::from_str(&s))
        .transpose()?;
    let meta = match row.try_get::<Option<String>, _>("meta")? {
        Some(raw) => serde_json::from_str(&raw)?,
        None => serde_json::Value::Null,
    };

    Ok(Article {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        url_hash: row.try_get("url_hash")?,
        published_at: row.try_get::<Option<DateTime<Utc>>, _>("published_at")?,
        full_text: row.try_get("full_text")?,
        summary: row.try_get("summary")?,
        sentiment,
        meta,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    fn article(source_id: i64, url: &str) -> NewArticle {
        NewArticle {
            source_id,
            title: "Title".to_string(),
            url: url.to_string(),
            url_hash: fingerprint(url),
            published_at: None,
            full_text: "Body".to_string(),
            summary: None,
            sentiment: Some(Sentiment::Neutral),
            meta: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn conflicting_insert_is_duplicate() -> Result<()> {
        let store = ArticleStore::connect("sqlite::memory:").await?;
        let source = store.upsert_source("Example", "https://example.com", None).await?;
        let first = article(source.id, "https://example.com/a");

        assert!(matches!(store.insert_or_classify(&first).await, StoreOutcome::Stored(_)));
        // bypasses the existence check, as a concurrent writer would
        assert_eq!(store.insert_or_classify(&first).await, StoreOutcome::Duplicate);
        assert_eq!(store.count_articles().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn other_write_errors_are_failures() -> Result<()> {
        let store = ArticleStore::connect("sqlite::memory:").await?;
        let orphan = article(999, "https://example.com/orphan");

        assert!(matches!(store.insert_or_classify(&orphan).await, StoreOutcome::Failed(_)));
        assert_eq!(store.count_articles().await?, 0);
        Ok(())
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_sure\\"), "100\\%\\_sure\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
