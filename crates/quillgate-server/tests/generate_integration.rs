use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use quillgate_core::config::Config;
use quillgate_core::generation::{GenerationRequest, TokenUsage};
use quillgate_core::quota::UsageCategory;
use quillgate_core::service::Service;
use quillgate_core::usage::{UsageEvent, UsageReportFilter};
use quillgate_duckdb::DuckDbBackend;
use quillgate_server::app::build_app;
use quillgate_server::engine::providers::{
    GenerationProvider, ProviderCallError, ProviderRegistry, ProviderResponse,
};
use quillgate_server::state::AppState;

fn test_config() -> Config {
    Config {
        port: 0,
        data_dir: "/tmp/quillgate-test".to_string(),
        duckdb_memory_limit: "1GB".to_string(),
        admin_users: vec![],
        quota_utc_offset_minutes: 0,
        settings_cache_ttl_secs: 0,
        cors_origins: vec![],
        provider_timeout_secs: 5,
        openai_api_key: None,
        openai_base_url: "http://localhost:1".to_string(),
        anthropic_api_key: None,
        anthropic_base_url: "http://localhost:1".to_string(),
    }
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON")
}

/// Stub provider: scripted success or failure, with a call counter.
struct StubProvider {
    name: &'static str,
    content: Option<&'static str>,
    usage: Option<TokenUsage>,
    calls: AtomicUsize,
}

impl StubProvider {
    fn succeeding(name: &'static str, content: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            content: Some(content),
            usage: Some(TokenUsage {
                input_tokens: 11,
                output_tokens: 42,
            }),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            content: None,
            usage: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for StubProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn generate(
        &self,
        _model: &str,
        _request: &GenerationRequest,
    ) -> Result<ProviderResponse, ProviderCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.content {
            Some(content) => Ok(ProviderResponse {
                content: content.to_string(),
                usage: self.usage,
            }),
            None => Err(ProviderCallError::Status {
                status: 500,
                body: "stub outage".to_string(),
            }),
        }
    }
}

fn registry(providers: &[Arc<StubProvider>]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::default();
    for provider in providers {
        registry.insert(Arc::clone(provider) as Arc<dyn GenerationProvider>);
    }
    registry
}

fn generate_request(user_id: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header("content-type", "application/json")
        .header("x-user-id", user_id)
        .body(Body::from(body.to_string()))
        .expect("build request")
}

fn writing_body() -> Value {
    // Books/writing resolves to the (anthropic primary, openai backup)
    // default pair when no settings row exists.
    json!({
        "service": "books",
        "category": "text",
        "phase": "writing",
        "request": {
            "messages": [
                { "role": "system", "content": "You are a novelist." },
                { "role": "user", "content": "Write the opening paragraph." }
            ],
            "temperature": 0.8,
            "max_tokens": 400
        }
    })
}

/// The usage append is fire-and-forget; poll until it lands.
async fn wait_for_usage_count(state: &AppState, user_id: &str, expected: i64) {
    for _ in 0..100 {
        let count = state
            .db
            .count_usage(user_id, Service::Books, UsageCategory::Text, None)
            .await
            .expect("count");
        if count == expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("usage event count never reached {expected}");
}

#[tokio::test]
async fn test_primary_serves_and_is_logged() {
    let primary = StubProvider::succeeding("anthropic", "Opening paragraph.");
    let backup = StubProvider::succeeding("openai", "should not serve");
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::with_providers(
        db,
        test_config(),
        registry(&[Arc::clone(&primary), Arc::clone(&backup)]),
    ));
    let app = build_app(Arc::clone(&state));

    let response = app
        .oneshot(generate_request("user_1", writing_body()))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["content"], "Opening paragraph.");
    assert_eq!(json["data"]["provider_used"], "anthropic");
    assert_eq!(json["data"]["model_used"], "claude-3-7-sonnet");
    assert_eq!(json["data"]["usage"]["output_tokens"], 42);

    assert_eq!(primary.call_count(), 1);
    assert_eq!(backup.call_count(), 0);

    wait_for_usage_count(&state, "user_1", 1).await;
}

#[tokio::test]
async fn test_backup_serves_when_primary_fails() {
    let primary = StubProvider::failing("anthropic");
    let backup = StubProvider::succeeding("openai", "Backup prose.");
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::with_providers(
        db,
        test_config(),
        registry(&[Arc::clone(&primary), Arc::clone(&backup)]),
    ));
    let app = build_app(Arc::clone(&state));

    let response = app
        .oneshot(generate_request("user_1", writing_body()))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["content"], "Backup prose.");
    assert_eq!(json["data"]["provider_used"], "openai");
    assert_eq!(json["data"]["model_used"], "gpt-4o");

    assert_eq!(primary.call_count(), 1);
    assert_eq!(backup.call_count(), 1);

    // Exactly one event, attributed to the leg that actually served.
    wait_for_usage_count(&state, "user_1", 1).await;
    let report = state
        .db
        .usage_report(&UsageReportFilter {
            service: Some(Service::Books),
            start_date: Utc::now().date_naive(),
            end_date: Utc::now().date_naive(),
        })
        .await
        .expect("report");
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].provider, "openai");
    assert_eq!(report[0].model, "gpt-4o");
    assert_eq!(report[0].calls, 1);
}

#[tokio::test]
async fn test_both_legs_failing_is_503_and_appends_nothing() {
    let primary = StubProvider::failing("anthropic");
    let backup = StubProvider::failing("openai");
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::with_providers(
        db,
        test_config(),
        registry(&[Arc::clone(&primary), Arc::clone(&backup)]),
    ));
    let app = build_app(Arc::clone(&state));

    let response = app
        .oneshot(generate_request("user_1", writing_body()))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "generation-unavailable");

    // One attempt per leg, no further retries.
    assert_eq!(primary.call_count(), 1);
    assert_eq!(backup.call_count(), 1);

    // Give any stray append task a moment, then confirm none happened.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let count = state
        .db
        .count_usage("user_1", Service::Books, UsageCategory::Text, None)
        .await
        .expect("count");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_json_mode_repairs_fenced_output() {
    let primary = StubProvider::succeeding("anthropic", "```json\n{\"chapters\": 12}\n```");
    let backup = StubProvider::succeeding("openai", "{\"chapters\": 1}");
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::with_providers(
        db,
        test_config(),
        registry(&[Arc::clone(&primary), Arc::clone(&backup)]),
    ));
    let app = build_app(Arc::clone(&state));

    let mut body = writing_body();
    body["request"]["json_mode"] = json!(true);

    let response = app
        .oneshot(generate_request("user_1", body))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    // Repaired in place: fences stripped, primary still serves.
    assert_eq!(json["data"]["content"], "{\"chapters\": 12}");
    assert_eq!(json["data"]["provider_used"], "anthropic");
    assert_eq!(backup.call_count(), 0);
}

#[tokio::test]
async fn test_json_mode_unparsable_primary_falls_to_backup() {
    let primary = StubProvider::succeeding("anthropic", "I will not produce JSON.");
    let backup = StubProvider::succeeding("openai", "{\"chapters\": 3}");
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::with_providers(
        db,
        test_config(),
        registry(&[Arc::clone(&primary), Arc::clone(&backup)]),
    ));
    let app = build_app(Arc::clone(&state));

    let mut body = writing_body();
    body["request"]["json_mode"] = json!(true);

    let response = app
        .oneshot(generate_request("user_1", body))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["content"], "{\"chapters\": 3}");
    assert_eq!(json["data"]["provider_used"], "openai");
}

#[tokio::test]
async fn test_generate_denied_before_spending_money() {
    let primary = StubProvider::succeeding("anthropic", "should never run");
    let backup = StubProvider::succeeding("openai", "should never run");
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::with_providers(
        db,
        test_config(),
        registry(&[Arc::clone(&primary), Arc::clone(&backup)]),
    ));

    // Exhaust the free text cap before calling.
    for _ in 0..3 {
        let event = UsageEvent::new(
            "user_1",
            Service::Books,
            UsageCategory::Text,
            "openai",
            "gpt-4o-mini",
            10,
            20,
        );
        state.db.append_usage(&event).await.expect("append");
    }

    let app = build_app(Arc::clone(&state));
    let response = app
        .oneshot(generate_request("user_1", writing_body()))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "category-limit-reached");
    assert_eq!(json["error"]["used"], 3);
    assert_eq!(json["error"]["limit"], 3);

    // The quota gate ran before any provider was touched.
    assert_eq!(primary.call_count(), 0);
    assert_eq!(backup.call_count(), 0);
}

#[tokio::test]
async fn test_unsupported_phase_is_loud_config_error() {
    // ads/revision has neither a settings row nor a hardcoded default.
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::with_providers(
        db,
        test_config(),
        ProviderRegistry::default(),
    ));
    let app = build_app(state);

    let body = json!({
        "service": "ads",
        "category": "text",
        "phase": "revision",
        "request": {
            "messages": [{ "role": "user", "content": "Polish this tagline." }]
        }
    });
    let response = app
        .oneshot(generate_request("user_1", body))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "provider-config-missing");
}
