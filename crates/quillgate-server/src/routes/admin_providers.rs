use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use quillgate_core::plan::PlanTier;
use quillgate_core::provider::Phase;
use quillgate_core::service::Service;
use quillgate_metadata::UpsertProviderSettingParams;

use crate::error::AppError;
use crate::routes::require_admin;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProviderSettingRequest {
    pub primary_provider: String,
    pub primary_model: String,
    pub backup_provider: String,
    pub backup_model: String,
}

fn validate_field(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

/// `GET /api/admin/providers/{service}` — all persisted routing rows for
/// one service. Routes with no row resolve through the alias table and the
/// hardcoded defaults; use the decision endpoint to see the effective route.
pub async fn list_provider_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(service): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let _ = require_admin(&state, &headers)?;
    let service = Service::parse(&service).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let settings = state
        .db
        .list_provider_settings(service)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({ "data": settings })))
}

/// `PUT /api/admin/providers/{service}/{tier}/{phase}` — write one routing
/// row. Replaces in place (routing rows are not versioned; the updated_at
/// column records the last edit).
pub async fn update_provider_setting(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((service, tier, phase)): Path<(String, String, String)>,
    Json(body): Json<UpdateProviderSettingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let admin = require_admin(&state, &headers)?;
    let service = Service::parse(&service).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let tier = PlanTier::parse(&tier).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let phase = Phase::parse(&phase).map_err(|e| AppError::BadRequest(e.to_string()))?;

    validate_field(&body.primary_provider, "primary_provider")?;
    validate_field(&body.primary_model, "primary_model")?;
    validate_field(&body.backup_provider, "backup_provider")?;
    validate_field(&body.backup_model, "backup_model")?;

    let setting = state
        .db
        .upsert_provider_setting(
            service,
            tier,
            phase,
            UpsertProviderSettingParams {
                primary_provider: body.primary_provider,
                primary_model: body.primary_model,
                backup_provider: body.backup_provider,
                backup_model: body.backup_model,
            },
        )
        .await
        .map_err(AppError::Internal)?;
    state.invalidate_routing(service, tier, phase).await;

    tracing::info!(
        admin, service = %service, tier = %tier, phase = %phase,
        primary = %setting.primary_provider, backup = %setting.backup_provider,
        "provider setting updated"
    );

    Ok(Json(json!({ "data": setting })))
}
