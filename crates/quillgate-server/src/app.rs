use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer` — structured request/response logging via `tracing`.
/// 2. `CorsLayer` — permissive CORS; the engine sits behind feature
///    handlers and trusts the identity header, so CORS is not a security
///    boundary here.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/quota/check", post(routes::quota::check))
        .route("/api/generate", post(routes::generate::generate))
        .route(
            "/api/admin/plans/{service}",
            get(routes::admin_plans::list_plan_limits),
        )
        .route(
            "/api/admin/plans/{service}/{tier}",
            put(routes::admin_plans::update_plan_limits),
        )
        .route(
            "/api/admin/providers/{service}",
            get(routes::admin_providers::list_provider_settings),
        )
        .route(
            "/api/admin/providers/{service}/{tier}/{phase}",
            put(routes::admin_providers::update_provider_setting),
        )
        .route(
            "/api/admin/usage/report",
            get(routes::admin_usage::usage_report),
        )
        .route(
            "/api/admin/decision",
            get(routes::decision::effective_decision),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
