use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use quillgate_core::quota::UsageCategory;
use quillgate_core::service::Service;

use crate::engine::{entitlement, ledger};
use crate::error::AppError;
use crate::routes::require_user_id;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuotaCheckRequest {
    pub service: String,
    pub category: String,
}

/// `POST /api/quota/check` — the entitlement-and-quota gate as a read.
///
/// Always returns `200` with the full decision; a deny is a result here,
/// not an error. Feature handlers call this first and translate a deny into
/// their own user-facing payload using the machine-readable reason code.
pub async fn check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<QuotaCheckRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user_id(&headers)?;
    let service =
        Service::parse(&body.service).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let category =
        UsageCategory::parse(&body.category).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let resolved = entitlement::resolve(&state, &user_id, service).await;
    let decision = ledger::check(&state, &user_id, service, category, resolved.plan_tier).await;

    Ok(Json(json!({
        "data": {
            "user_id": user_id,
            "service": service,
            "category": category,
            "plan_tier": resolved.plan_tier,
            "source": resolved.source,
            "expires_at": resolved.expires_at,
            "allowed": decision.allowed,
            "used": decision.used,
            "limit": decision.limit,
            "reason": decision.reason,
        }
    })))
}
