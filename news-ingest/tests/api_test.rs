mod common;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use news_ingest::api::{self, AppState};
use news_ingest::fingerprint::fingerprint;
use news_ingest::{ArticleStore, NewArticle, Result, Sentiment};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt as _;

const BODY_LIMIT: usize = 1024 * 1024;

async fn seeded() -> Result<Arc<ArticleStore>> {
    let store = common::memory_store().await?;
    let source = store
        .upsert_source("Example", "https://example.com", Some("https://example.com/rss"))
        .await?;
    for (title, sentiment) in [
        ("Markets rally", Sentiment::Positive),
        ("Storm hits coast", Sentiment::Negative),
        ("Markets calm", Sentiment::Neutral),
    ] {
        let url = format!("https://example.com/{}", title.replace(' ', "-"));
        store
            .store_if_absent(&NewArticle {
                source_id: source.id,
                title: title.to_string(),
                url_hash: fingerprint(&url),
                url,
                published_at: None,
                full_text: "text".to_string(),
                summary: Some(format!("{} summary", title)),
                sentiment: Some(sentiment),
                meta: serde_json::json!({}),
            })
            .await;
    }
    Ok(store)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_reports_ok() -> Result<()> {
    let app = api::router(AppState::new(common::memory_store().await?));
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    Ok(())
}

#[tokio::test]
async fn sources_are_listed() -> Result<()> {
    let app = api::router(AppState::new(seeded().await?));
    let (status, body) = get(app, "/sources").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["name"], "Example");
    assert_eq!(body[0]["base_url"], "https://example.com");
    Ok(())
}

#[tokio::test]
async fn articles_are_filtered_and_carry_their_source() -> Result<()> {
    let store = seeded().await?;

    let (status, body) = get(api::router(AppState::new(store.clone())), "/articles").await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|a| a["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Markets calm", "Storm hits coast", "Markets rally"]);
    assert_eq!(body[0]["source"]["name"], "Example");

    let (_, body) = get(
        api::router(AppState::new(store.clone())),
        "/articles?q=markets&sentiment=positive",
    )
    .await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["title"], "Markets rally");
    assert_eq!(body[0]["sentiment"], "positive");

    let (_, body) = get(api::router(AppState::new(store)), "/articles?limit=2").await;
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn invalid_filters_are_rejected() -> Result<()> {
    let store = seeded().await?;
    for uri in ["/articles?limit=0", "/articles?limit=101", "/articles?sentiment=mixed"] {
        let (status, body) = get(api::router(AppState::new(store.clone())), uri).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
        assert!(body["detail"].is_string());
    }
    Ok(())
}
