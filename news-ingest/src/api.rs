//! Read-only HTTP surface over the article store.

use crate::store::{ArticleStore, MAX_LIST_LIMIT};
use crate::types::{Article, ArticleQuery, Sentiment, Source};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    store: Arc<ArticleStore>,
}

impl AppState {
    pub fn new(store: Arc<ArticleStore>) -> Self {
        Self { store }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sources", get(list_sources))
        .route("/articles", get(list_articles))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct SourceOut {
    id: i64,
    name: String,
    base_url: String,
}

impl From<&Source> for SourceOut {
    fn from(source: &Source) -> Self {
        Self {
            id: source.id,
            name: source.name.clone(),
            base_url: source.base_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ArticleOut {
    id: i64,
    source: Option<SourceOut>,
    title: String,
    url: String,
    published_at: Option<DateTime<Utc>>,
    summary: Option<String>,
    sentiment: Option<Sentiment>,
}

#[derive(Debug, Deserialize)]
struct ArticleParams {
    q: Option<String>,
    sentiment: Option<String>,
    source_id: Option<i64>,
    limit: Option<u32>,
}

enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

impl From<crate::types::IngestError> for ApiError {
    fn from(err: crate::types::IngestError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn list_sources(State(state): State<AppState>) -> Result<Json<Vec<SourceOut>>, ApiError> {
    let sources = state.store.list_sources().await?;
    Ok(Json(sources.iter().map(SourceOut::from).collect()))
}

async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<ArticleParams>,
) -> Result<Json<Vec<ArticleOut>>, ApiError> {
    let query = article_query(params)?;
    let articles = state.store.list_articles(&query).await?;
    let sources: HashMap<i64, Source> = state
        .store
        .list_sources()
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    Ok(Json(
        articles
            .into_iter()
            .map(|article| article_out(article, &sources))
            .collect(),
    ))
}

fn article_query(params: ArticleParams) -> Result<ArticleQuery, ApiError> {
    if let Some(limit) = params.limit {
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_LIST_LIMIT
            )));
        }
    }
    let sentiment = params
        .sentiment
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<Sentiment>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(ArticleQuery {
        keyword: params.q,
        sentiment,
        source_id: params.source_id,
        limit: params.limit,
    })
}

fn article_out(article: Article, sources: &HashMap<i64, Source>) -> ArticleOut {
    ArticleOut {
        id: article.id,
        source: sources.get(&article.source_id).map(SourceOut::from),
        title: article.title,
        url: article.url,
        published_at: article.published_at,
        summary: article.summary,
        sentiment: article.sentiment,
    }
}
