use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use quillgate_core::error::GovernanceError;
use quillgate_core::plan::PlanTier;
use quillgate_core::provider::Phase;
use quillgate_core::quota::{DenyReason, QuotaDecision, UsageCategory};
use quillgate_core::service::Service;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so Axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type. The `code`
/// field of the JSON envelope is the machine-readable contract; messages are
/// advisory and feature handlers must not parse them.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Caller identity header missing or empty.
    #[error("unauthorized")]
    Unauthorized,

    /// Caller is not on the administrator allow-list.
    #[error("forbidden")]
    Forbidden,

    /// The quota ledger denied the request. Carries the full decision so the
    /// response can tell "upgrade your plan" denials apart from retryable
    /// datastore trouble.
    #[error("quota denied: {category}")]
    QuotaDenied {
        category: UsageCategory,
        decision: QuotaDecision,
    },

    /// Configuration bug: a route with neither a settings row nor a default.
    #[error("no provider configured for {service}/{tier}/{phase}")]
    ProviderConfigMissing {
        service: Service,
        tier: PlanTier,
        phase: Phase,
    },

    /// Both generation legs failed; the caller should retry shortly.
    #[error("generation unavailable")]
    GenerationUnavailable { primary: String, backup: String },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<GovernanceError> for AppError {
    fn from(err: GovernanceError) -> Self {
        match err {
            GovernanceError::QuotaExceeded {
                category,
                reason,
                used,
                limit,
            } => AppError::QuotaDenied {
                category,
                decision: QuotaDecision::deny(reason, used, limit),
            },
            GovernanceError::AiDisabledForTier => AppError::QuotaDenied {
                category: UsageCategory::Text,
                decision: QuotaDecision::deny(DenyReason::AiDisabledForTier, 0, 0),
            },
            GovernanceError::ProviderConfigMissing {
                service,
                tier,
                phase,
            } => AppError::ProviderConfigMissing {
                service,
                tier,
                phase,
            },
            GovernanceError::GenerationUnavailable { primary, backup } => {
                AppError::GenerationUnavailable { primary, backup }
            }
            GovernanceError::DatastoreUnavailable(msg) => {
                AppError::Internal(anyhow::anyhow!("datastore unavailable: {msg}"))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, retry_after_seconds) = match &self {
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "not_found", msg.clone(), None)
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
                None,
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Caller identity required".to_string(),
                None,
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "Administrator access required".to_string(),
                None,
            ),
            AppError::QuotaDenied { category, decision } => {
                let reason = decision.reason.unwrap_or(DenyReason::CategoryLimitReached);
                let (status, retry_after) = match reason {
                    // Kill-switch: a plan problem, not a rate problem.
                    DenyReason::AiDisabledForTier => (StatusCode::FORBIDDEN, None),
                    // Retryable infrastructure trouble, not a quota message.
                    DenyReason::DatastoreUnavailable => {
                        (StatusCode::SERVICE_UNAVAILABLE, Some(10))
                    }
                    _ => (StatusCode::TOO_MANY_REQUESTS, None),
                };
                // Full decision in the body; handled below.
                let mut response = (
                    status,
                    Json(json!({
                        "error": {
                            "code": reason.as_str(),
                            "message": format!("quota denied for {category}"),
                            "category": category,
                            "used": decision.used,
                            "limit": decision.limit,
                        }
                    })),
                )
                    .into_response();
                if let Some(secs) = retry_after {
                    if let Ok(value) = secs.to_string().parse() {
                        response
                            .headers_mut()
                            .insert(axum::http::header::RETRY_AFTER, value);
                    }
                }
                return response;
            }
            AppError::ProviderConfigMissing {
                service,
                tier,
                phase,
            } => {
                // Loud: a new phase/service landed without matching defaults.
                tracing::error!(
                    service = %service, tier = %tier, phase = %phase,
                    "No provider setting and no hardcoded default for route"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "provider-config-missing",
                    format!("no provider configured for {service}/{tier}/{phase}"),
                    None,
                )
            }
            AppError::GenerationUnavailable { primary, backup } => {
                tracing::warn!(
                    primary_error = %primary,
                    backup_error = %backup,
                    "Both generation providers failed"
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "generation-unavailable",
                    "Generation temporarily unavailable, retry shortly".to_string(),
                    Some(30),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let mut response = (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            })),
        )
            .into_response();

        if let Some(retry_after_seconds) = retry_after_seconds {
            if let Ok(value) = retry_after_seconds.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }

        response
    }
}
