use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use quillgate_core::service::Service;
use quillgate_core::usage::UsageReportFilter;

use crate::error::AppError;
use crate::routes::require_admin;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UsageReportQuery {
    pub service: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid {field}, expected YYYY-MM-DD")))
}

/// `GET /api/admin/usage/report?service=&from=&to=` — usage events
/// aggregated by (day, service, category, provider, model).
///
/// Defaults to the trailing 30 days. Dates are inclusive and interpreted
/// against UTC calendar days (reporting granularity, not the quota window).
pub async fn usage_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<UsageReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let _ = require_admin(&state, &headers)?;

    let service = match &query.service {
        Some(raw) => Some(Service::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))?),
        None => None,
    };
    let today = Utc::now().date_naive();
    let end_date = match &query.to {
        Some(raw) => parse_date(raw, "to")?,
        None => today,
    };
    let start_date = match &query.from {
        Some(raw) => parse_date(raw, "from")?,
        None => end_date - Duration::days(30),
    };
    if start_date > end_date {
        return Err(AppError::BadRequest("from must not be after to".to_string()));
    }

    let rows = state
        .db
        .usage_report(&UsageReportFilter {
            service,
            start_date,
            end_date,
        })
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({
        "data": {
            "from": start_date.to_string(),
            "to": end_date.to_string(),
            "rows": rows,
        }
    })))
}
