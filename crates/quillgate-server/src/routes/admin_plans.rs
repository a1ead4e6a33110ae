use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use quillgate_core::plan::{PlanLimits, PlanTier};
use quillgate_core::service::Service;

use crate::error::AppError;
use crate::routes::require_admin;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdatePlanLimitsRequest {
    pub content_creation_cap: i64,
    pub text_daily_cap: i64,
    pub image_daily_cap: i64,
    pub total_daily_cap: i64,
    pub premium_credit_daily_cap: i64,
    pub standard_credit_daily_cap: i64,
    pub ai_enabled: bool,
}

fn validate_cap(value: i64, field: &str) -> Result<(), AppError> {
    // -1 = unlimited; anything else must be a non-negative count.
    if value < -1 {
        return Err(AppError::BadRequest(format!(
            "{field} must be >= 0, or -1 for unlimited"
        )));
    }
    Ok(())
}

/// `GET /api/admin/plans/{service}` — the active catalog rows for one
/// service. Tiers with no row fall back to hardcoded defaults at check
/// time; only persisted rows are listed here.
pub async fn list_plan_limits(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(service): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let _ = require_admin(&state, &headers)?;
    let service = Service::parse(&service).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let records = state
        .db
        .list_plan_limits(service)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({ "data": records })))
}

/// `PUT /api/admin/plans/{service}/{tier}` — write a new catalog version.
///
/// Versioned upsert: the previous row is deactivated, never mutated.
/// The engine observes the change within the settings-cache TTL on other
/// workers; this worker reads it back immediately.
pub async fn update_plan_limits(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((service, tier)): Path<(String, String)>,
    Json(body): Json<UpdatePlanLimitsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let admin = require_admin(&state, &headers)?;
    let service = Service::parse(&service).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let tier = PlanTier::parse(&tier).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if tier == PlanTier::Staff {
        return Err(AppError::BadRequest(
            "the staff tier is synthetic and has no catalog rows".to_string(),
        ));
    }

    validate_cap(body.content_creation_cap, "content_creation_cap")?;
    validate_cap(body.text_daily_cap, "text_daily_cap")?;
    validate_cap(body.image_daily_cap, "image_daily_cap")?;
    validate_cap(body.total_daily_cap, "total_daily_cap")?;
    validate_cap(body.premium_credit_daily_cap, "premium_credit_daily_cap")?;
    validate_cap(body.standard_credit_daily_cap, "standard_credit_daily_cap")?;

    let limits = PlanLimits {
        content_creation_cap: body.content_creation_cap,
        text_daily_cap: body.text_daily_cap,
        image_daily_cap: body.image_daily_cap,
        total_daily_cap: body.total_daily_cap,
        premium_credit_daily_cap: body.premium_credit_daily_cap,
        standard_credit_daily_cap: body.standard_credit_daily_cap,
        ai_enabled: body.ai_enabled,
    };

    let record = state
        .db
        .upsert_plan_limits(service, tier, limits)
        .await
        .map_err(AppError::Internal)?;
    state.invalidate_limits(service, tier).await;

    tracing::info!(
        admin, service = %service, tier = %tier, version = record.version,
        "plan limits updated"
    );

    Ok(Json(json!({ "data": record })))
}
