use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use civic_digest::openai::fake::FakeOpenAIClient;
use civic_digest::records::{VideoRecord, VideoStatus};
use civic_digest::test_utils::{issue, location, meeting};
use civic_digest::transcripts::fake::FakeTranscriptProvider;
use civic_digest::AppState;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::Once;
use tower::util::ServiceExt;
use tracing::debug;

// Initialize logging once for all tests
static INIT: Once = Once::new();

fn init_test_logging() {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info,tower_http=debug".into()),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
        debug!("Test logging initialized");
    });
}

const ANALYSIS_REPLY: &str = r#"```json
{
    "summary": "Residents asked about road repairs.",
    "meetingDate": "2024-05-02",
    "meetingType": "City Council",
    "location": {"city": "Tupelo", "county": "Lee", "state": "MS"},
    "issues": [
        {"title": "Pothole repairs", "description": "Main St backlog", "category": "Infrastructure"}
    ]
}
```"#;

/// Create a test app with no external clients
async fn app() -> (Arc<AppState>, Router) {
    init_test_logging();
    let app_state = Arc::new(AppState::new_for_testing().await);
    let routes = civic_digest::app::routes(app_state.clone());
    (app_state, routes)
}

async fn app_with(
    llm: Arc<FakeOpenAIClient>,
    provider: Arc<FakeTranscriptProvider>,
) -> (Arc<AppState>, Router) {
    init_test_logging();
    let app_state = Arc::new(
        AppState::new_for_testing_with_clients(Some(llm), Some(provider)).await,
    );
    let routes = civic_digest::app::routes(app_state.clone());
    (app_state, routes)
}

async fn post_json(router: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_, router) = app().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_not_found() {
    let (_, router) = app().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_with_real_server() {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (_app_state, router) = app().await;
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/api/research/ingest", addr))
        .json(&json!({ "urls": "not-an-array" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Invalid input: 'urls' must be an array" }));
}

#[tokio::test]
async fn test_ingest_rejects_missing_urls() {
    let (_, router) = app().await;

    for body in ["{}", "", r#"{"urls": [1, 2]}"#] {
        let (status, value) =
            post_json(&router, "/api/research/ingest", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
        assert_eq!(value["error"], "Invalid input: 'urls' must be an array");
    }
}

#[tokio::test]
async fn test_ingest_then_analyze_then_report() {
    let llm = Arc::new(
        FakeOpenAIClient::new()
            .with_response(ANALYSIS_REPLY)
            .with_response("# Dashboard\n\n- Tupelo, MS: potholes"),
    );
    let provider = Arc::new(FakeTranscriptProvider::new().with_video(
        "dQw4w9WgXcQ",
        Some("Council Meeting"),
        &["Hello", "world"],
    ));
    let (state, router) = app_with(llm.clone(), provider.clone()).await;

    let (status, value) = post_json(
        &router,
        "/api/research/ingest",
        r#"{"urls": ["https://www.youtube.com/watch?v=dQw4w9WgXcQ", "nope"]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = value["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["videoId"], "dQw4w9WgXcQ");
    assert_eq!(results[0]["status"], "fetched");
    assert_eq!(results[0]["transcript"], "Hello world");
    assert_eq!(
        results[1],
        json!({ "url": "nope", "status": "error", "error": "Invalid URL" })
    );

    let (status, value) = post_json(
        &router,
        "/api/research/analyze",
        r#"{"videoId": "dQw4w9WgXcQ"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "analyzed");
    assert_eq!(value["analysis"]["location"]["city"], "Tupelo");
    assert_eq!(
        value["analysis"]["issues"][0]["category"],
        "Infrastructure"
    );
    assert!(llm.last_prompt().unwrap().contains("Hello world"));

    // A second analyze returns the stored analysis without a model call.
    let (status, again) = post_json(
        &router,
        "/api/research/analyze",
        r#"{"videoId": "dQw4w9WgXcQ"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["analysis"], value["analysis"]);
    assert_eq!(llm.request_count(), 1);

    // Re-ingesting an analyzed video is served from the store.
    let (_, value) = post_json(
        &router,
        "/api/research/ingest",
        r#"{"urls": ["https://youtu.be/dQw4w9WgXcQ"]}"#,
    )
    .await;
    assert_eq!(value["results"][0]["cached"], true);
    assert_eq!(provider.request_count(), 1);

    let (status, value) = post_json(
        &router,
        "/api/research/generate-report",
        r#"{"filters": {"category": "Infrastructure"}, "html": true}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["report"], "# Dashboard\n\n- Tupelo, MS: potholes");
    assert!(value["html"].as_str().unwrap().contains("<h1>Dashboard</h1>"));
    let report_prompt = llm.last_prompt().unwrap();
    assert!(report_prompt.contains("Location: Tupelo, MS"));
    assert!(report_prompt.contains("Infrastructure"));

    let stored = state.store.get("dQw4w9WgXcQ").await.unwrap().unwrap();
    assert_eq!(stored.status, VideoStatus::Analyzed);
}

#[tokio::test]
async fn test_analyze_validation_and_missing_transcript() {
    let llm = Arc::new(FakeOpenAIClient::new());
    let provider = Arc::new(FakeTranscriptProvider::new());
    let (_, router) = app_with(llm.clone(), provider).await;

    for body in ["{}", r#"{"videoId": ""}"#, ""] {
        let (status, value) =
            post_json(&router, "/api/research/analyze", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"], "Video ID is required");
    }

    let (status, value) = post_json(
        &router,
        "/api/research/analyze",
        r#"{"videoId": "missing1234"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["error"], "Transcript not found. Please ingest first.");
    assert_eq!(llm.request_count(), 0);
}

#[tokio::test]
async fn test_analyze_hides_model_failures() {
    let llm = Arc::new(FakeOpenAIClient::new().with_response("not json at all"));
    let provider = Arc::new(FakeTranscriptProvider::new().with_video(
        "abc12345678",
        None,
        &["Budget talk"],
    ));
    let (state, router) = app_with(llm, provider).await;
    post_json(
        &router,
        "/api/research/ingest",
        r#"{"urls": ["https://youtu.be/abc12345678"]}"#,
    )
    .await;

    let (status, value) = post_json(
        &router,
        "/api/research/analyze",
        r#"{"videoId": "abc12345678"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(value, json!({ "error": "Internal Server Error" }));

    let stored = state.store.get("abc12345678").await.unwrap().unwrap();
    assert_eq!(stored.status, VideoStatus::Fetched);
}

#[tokio::test]
async fn test_report_without_analyzed_videos() {
    let llm = Arc::new(FakeOpenAIClient::new());
    let provider = Arc::new(FakeTranscriptProvider::new());
    let (_, router) = app_with(llm.clone(), provider).await;

    let (status, value) =
        post_json(&router, "/api/research/generate-report", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["error"], "No analyzed videos found.");
    assert_eq!(llm.request_count(), 0);
}

#[tokio::test]
async fn test_report_unmatched_category() {
    let llm = Arc::new(FakeOpenAIClient::new());
    let provider = Arc::new(FakeTranscriptProvider::new());
    let (state, router) = app_with(llm.clone(), provider).await;
    let record = meeting(
        "aaaaaaaaaaa",
        Some(location("Oxford", "MS")),
        Some("2024-01-01"),
        vec![issue("Parking", "Business")],
    );
    state.store.set(&record.id, &record).await.unwrap();

    // Analyzed videos exist, so an unmatched category is still reported on.
    let (status, value) = post_json(
        &router,
        "/api/research/generate-report",
        r#"{"filters": {"category": "Public Safety"}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["report"], "Fake default response");
    assert_eq!(llm.request_count(), 1);
    assert!(!llm.last_prompt().unwrap().contains("Oxford"));

    // An empty category is no filter at all.
    let (status, value) = post_json(
        &router,
        "/api/research/generate-report",
        r#"{"filters": {"category": ""}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["report"], "Fake default response");
    assert!(value.get("html").is_none());
}

#[tokio::test]
async fn test_quick_analyze_without_captions() {
    let llm = Arc::new(FakeOpenAIClient::new());
    let provider = Arc::new(
        FakeTranscriptProvider::new()
            .with_error("abc12345678", "Transcripts are disabled"),
    );
    let (_, router) = app_with(llm.clone(), provider).await;

    let (status, value) = post_json(
        &router,
        "/api/analyze",
        r#"{"url": "https://youtu.be/abc12345678"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        value,
        json!({ "error": "No captions found for this video.", "code": "NO_CAPTIONS" })
    );

    let (status, value) =
        post_json(&router, "/api/analyze", r#"{"url": "not a url"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"], "Invalid YouTube URL");
    assert_eq!(llm.request_count(), 0);
}

#[tokio::test]
async fn test_quick_analyze_returns_summary() {
    let llm = Arc::new(FakeOpenAIClient::new().with_response(
        r#"{"summary": "<p>Short</p>", "issues": [{"title": "Zoning", "description": "Rezoning debated"}]}"#,
    ));
    let provider = Arc::new(FakeTranscriptProvider::new().with_video(
        "abc12345678",
        None,
        &["Zoning", "debate"],
    ));
    let (state, router) = app_with(llm, provider).await;

    let (status, value) = post_json(
        &router,
        "/api/analyze",
        r#"{"url": "https://youtu.be/abc12345678"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["summary"], "<p>Short</p>");
    assert_eq!(value["issues"][0]["title"], "Zoning");
    assert!(state.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_counts_records() {
    let (state, router) = app().await;
    let analyzed = meeting("aaaaaaaaaaa", None, None, vec![]);
    state.store.set(&analyzed.id, &analyzed).await.unwrap();
    let fetched = VideoRecord::fetched(
        "bbbbbbbbbbb",
        "https://youtu.be/bbbbbbbbbbb",
        None,
        "text".to_string(),
    );
    state.store.set(&fetched.id, &fetched).await.unwrap();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(value["store_backend"], "file");
    assert_eq!(value["total"], 2);
    assert_eq!(
        value["by_status"],
        json!({ "analyzed": 1, "error": 0, "fetched": 1, "queued": 0 })
    );
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}
