use axum::http::HeaderMap;

use crate::error::AppError;
use crate::state::AppState;

pub mod admin_plans;
pub mod admin_providers;
pub mod admin_usage;
pub mod decision;
pub mod generate;
pub mod health;
pub mod quota;

/// Caller identity header. Authentication itself is an external
/// collaborator; by the time a request reaches the engine the identity is
/// trusted.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extract the caller identity or reject with 401.
pub fn require_user_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

/// Extract the caller identity and require allow-list membership.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let user_id = require_user_id(headers)?;
    if !state.is_admin(&user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(user_id)
}
