use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use quillgate_core::generation::GenerationRequest;
use quillgate_core::provider::Phase;
use quillgate_core::quota::UsageCategory;
use quillgate_core::service::Service;

use crate::engine::executor::{self, ExecutionContext};
use crate::engine::{entitlement, ledger, models};
use crate::error::AppError;
use crate::routes::require_user_id;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub service: String,
    pub category: String,
    pub phase: String,
    pub request: GenerationRequest,
}

/// `POST /api/generate` — the full pipeline for one generation call:
/// entitlement → quota gate → provider resolution → fallback-aware
/// execution. Strictly sequential; the quota gate always runs before money
/// is spent on a provider call.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<GenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user_id(&headers)?;
    let service =
        Service::parse(&body.service).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let category =
        UsageCategory::parse(&body.category).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let phase = Phase::parse(&body.phase).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if body.request.messages.is_empty() {
        return Err(AppError::BadRequest("messages must not be empty".to_string()));
    }

    let resolved = entitlement::resolve(&state, &user_id, service).await;

    let decision = ledger::check(&state, &user_id, service, category, resolved.plan_tier).await;
    if !decision.allowed {
        return Err(AppError::QuotaDenied { category, decision });
    }

    let pair = models::resolve(&state, service, resolved.plan_tier, phase).await?;

    let ctx = ExecutionContext {
        user_id,
        service,
        category,
    };
    let result = executor::execute(&state, ctx, pair, body.request).await?;

    Ok(Json(json!({ "data": result })))
}
