use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use quillgate_core::provider::Phase;
use quillgate_core::quota::UsageCategory;
use quillgate_core::service::Service;

use crate::engine::{entitlement, ledger, models};
use crate::error::AppError;
use crate::routes::require_admin;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DecisionQuery {
    pub user_id: String,
    pub service: String,
    pub category: String,
    pub phase: String,
}

/// `GET /api/admin/decision?user_id=&service=&category=&phase=` — the
/// effective decision for a hypothetical request, for health-check tooling.
///
/// Runs the same entitlement → quota → route pipeline as a real request but
/// spends nothing: no generation, no usage event. Lets operators verify
/// what a user would get and catch configured routes that no longer
/// resolve (`provider_config_missing`) before users do.
pub async fn effective_decision(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DecisionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let _ = require_admin(&state, &headers)?;

    let service =
        Service::parse(&query.service).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let category =
        UsageCategory::parse(&query.category).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let phase = Phase::parse(&query.phase).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let resolved = entitlement::resolve(&state, &query.user_id, service).await;
    let decision =
        ledger::check(&state, &query.user_id, service, category, resolved.plan_tier).await;

    // A missing route is a finding here, not a failure.
    let route = match models::resolve(&state, service, resolved.plan_tier, phase).await {
        Ok(pair) => json!({ "status": "ok", "pair": pair }),
        Err(e) => json!({ "status": "provider_config_missing", "detail": e.to_string() }),
    };

    Ok(Json(json!({
        "data": {
            "user_id": query.user_id,
            "service": service,
            "entitlement": {
                "plan_tier": resolved.plan_tier,
                "source": resolved.source,
                "expires_at": resolved.expires_at,
            },
            "quota": {
                "category": category,
                "allowed": decision.allowed,
                "used": decision.used,
                "limit": decision.limit,
                "reason": decision.reason,
            },
            "route": route,
        }
    })))
}
