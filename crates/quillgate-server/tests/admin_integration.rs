use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use quillgate_core::config::Config;
use quillgate_core::quota::UsageCategory;
use quillgate_core::service::Service;
use quillgate_core::usage::UsageEvent;
use quillgate_duckdb::DuckDbBackend;
use quillgate_server::app::build_app;
use quillgate_server::state::AppState;

fn test_config() -> Config {
    Config {
        port: 0,
        data_dir: "/tmp/quillgate-test".to_string(),
        duckdb_memory_limit: "1GB".to_string(),
        admin_users: vec!["admin_1".to_string()],
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

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder
        .body(match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        })
        .expect("build request")
}

#[tokio::test]
async fn test_admin_routes_reject_non_admins() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::new(db, test_config()));
    let app = build_app(state);

    // No identity at all.
    let response = app
        .clone()
        .oneshot(request("GET", "/api/admin/plans/books", None, None))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Identity present but not on the allow-list.
    let response = app
        .oneshot(request(
            "GET",
            "/api/admin/plans/books",
            Some("user_1"),
            None,
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_plan_limits_update_takes_effect_on_checks() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::new(db, test_config()));
    let app = build_app(Arc::clone(&state));

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/admin/plans/books/free",
            Some("admin_1"),
            Some(json!({
                "content_creation_cap": 3,
                "text_daily_cap": 1,
                "image_daily_cap": 1,
                "total_daily_cap": 5,
                "premium_credit_daily_cap": 0,
                "standard_credit_daily_cap": 10,
                "ai_enabled": true
            })),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["version"], 1);
    assert_eq!(json["data"]["limits"]["text_daily_cap"], 1);

    // One event now exhausts the tightened cap.
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

    let response = app
        .oneshot(request(
            "POST",
            "/api/quota/check",
            Some("user_1"),
            Some(json!({ "service": "books", "category": "text" })),
        ))
        .await
        .expect("request");
    let json = json_body(response).await;
    assert_eq!(json["data"]["allowed"], false);
    assert_eq!(json["data"]["limit"], 1);
}

#[tokio::test]
async fn test_plan_limits_validation() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::new(db, test_config()));
    let app = build_app(state);

    // -2 is neither a count nor the unlimited sentinel.
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/admin/plans/books/free",
            Some("admin_1"),
            Some(json!({
                "content_creation_cap": -2,
                "text_daily_cap": 3,
                "image_daily_cap": 1,
                "total_daily_cap": 5,
                "premium_credit_daily_cap": 0,
                "standard_credit_daily_cap": 10,
                "ai_enabled": true
            })),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The staff tier is synthetic; no catalog rows.
    let response = app
        .oneshot(request(
            "PUT",
            "/api/admin/plans/books/staff",
            Some("admin_1"),
            Some(json!({
                "content_creation_cap": 1,
                "text_daily_cap": 1,
                "image_daily_cap": 1,
                "total_daily_cap": 1,
                "premium_credit_daily_cap": 1,
                "standard_credit_daily_cap": 1,
                "ai_enabled": true
            })),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_setting_round_trip_via_decision() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::new(db, test_config()));
    let app = build_app(Arc::clone(&state));

    // Before any row: the documented default pair for books/writing.
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/admin/decision?user_id=user_1&service=books&category=text&phase=writing",
            Some("admin_1"),
            None,
        ))
        .await
        .expect("request");
    let json = json_body(response).await;
    assert_eq!(json["data"]["route"]["status"], "ok");
    assert_eq!(json["data"]["route"]["pair"]["primary_provider"], "anthropic");
    assert_eq!(json["data"]["route"]["pair"]["primary_model"], "claude-3-7-sonnet");

    // Write a row, read back exactly those fields.
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/admin/providers/books/free/writing",
            Some("admin_1"),
            Some(json!({
                "primary_provider": "openai",
                "primary_model": "gpt-4o-mini",
                "backup_provider": "anthropic",
                "backup_model": "claude-3-5-haiku"
            })),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/admin/decision?user_id=user_1&service=books&category=text&phase=writing",
            Some("admin_1"),
            None,
        ))
        .await
        .expect("request");
    let json = json_body(response).await;
    assert_eq!(json["data"]["route"]["pair"]["primary_provider"], "openai");
    assert_eq!(json["data"]["route"]["pair"]["primary_model"], "gpt-4o-mini");
    assert_eq!(json["data"]["route"]["pair"]["backup_provider"], "anthropic");
    assert_eq!(json["data"]["route"]["pair"]["backup_model"], "claude-3-5-haiku");

    let response = app
        .oneshot(request(
            "GET",
            "/api/admin/providers/books",
            Some("admin_1"),
            None,
        ))
        .await
        .expect("request");
    let json = json_body(response).await;
    assert_eq!(json["data"].as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn test_quiz_premium_aliases_to_books_settings() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::new(db, test_config()));
    let app = build_app(Arc::clone(&state));

    // Row written for books/premium…
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/admin/providers/books/premium/writing",
            Some("admin_1"),
            Some(json!({
                "primary_provider": "anthropic",
                "primary_model": "claude-3-7-sonnet",
                "backup_provider": "openai",
                "backup_model": "gpt-4o"
            })),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    // …governs quiz/premium too, via the alias table. The quiz user needs a
    // premium entitlement for the tier to resolve.
    state
        .db
        .upsert_subscription(quillgate_metadata::UpsertSubscriptionParams {
            user_id: "user_quiz".to_string(),
            service: Service::Quiz,
            plan_tier: quillgate_core::plan::PlanTier::Premium,
            status: quillgate_core::entitlement::SubscriptionStatus::Active,
            current_period_end: Utc::now() + chrono::Duration::days(30),
        })
        .await
        .expect("subscription");

    let response = app
        .oneshot(request(
            "GET",
            "/api/admin/decision?user_id=user_quiz&service=quiz&category=text&phase=writing",
            Some("admin_1"),
            None,
        ))
        .await
        .expect("request");
    let json = json_body(response).await;
    assert_eq!(json["data"]["entitlement"]["plan_tier"], "premium");
    assert_eq!(json["data"]["route"]["pair"]["primary_model"], "claude-3-7-sonnet");
}

#[tokio::test]
async fn test_decision_surfaces_missing_route_config() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::new(db, test_config()));
    let app = build_app(state);

    // quiz/revision has no default and no row: a finding, not a 500.
    let response = app
        .oneshot(request(
            "GET",
            "/api/admin/decision?user_id=user_1&service=quiz&category=text&phase=revision",
            Some("admin_1"),
            None,
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["route"]["status"], "provider_config_missing");
}

#[tokio::test]
async fn test_usage_report_aggregates_by_route() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let state = Arc::new(AppState::new(db, test_config()));

    for user in ["user_1", "user_2"] {
        let event = UsageEvent::new(
            user,
            Service::Books,
            UsageCategory::Text,
            "anthropic",
            "claude-3-7-sonnet",
            100,
            200,
        );
        state.db.append_usage(&event).await.expect("append");
    }

    let app = build_app(Arc::clone(&state));
    let response = app
        .oneshot(request(
            "GET",
            "/api/admin/usage/report?service=books",
            Some("admin_1"),
            None,
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let rows = json["data"]["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["calls"], 2);
    assert_eq!(rows[0]["provider"], "anthropic");
    assert_eq!(rows[0]["input_tokens"], 200);
}
