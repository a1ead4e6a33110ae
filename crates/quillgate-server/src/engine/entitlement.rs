//! Entitlement resolution against the grant stores.

use chrono::Utc;
use tracing::warn;

use quillgate_core::entitlement::{effective_entitlement, ResolvedEntitlement};
use quillgate_core::service::Service;

use crate::state::AppState;

/// Resolve the caller's effective plan tier for one service.
///
/// Fetches the promo-grant and subscription rows, then applies the pure
/// precedence rule from `quillgate-core`. No side effects.
///
/// Fail-closed: if either store read fails, the caller resolves to the
/// default tier — never to an elevated one — and the failure is logged.
/// Entitlement trouble must not turn into free premium access, and it must
/// not block the request either (the default tier still gets its caps
/// checked downstream).
pub async fn resolve(state: &AppState, user_id: &str, service: Service) -> ResolvedEntitlement {
    let now = Utc::now();
    let is_admin = state.is_admin(user_id);

    // The allow-list needs no datastore; short-circuit before any I/O.
    if is_admin {
        return effective_entitlement(true, &[], &[], now);
    }

    let grants = match state.db.promo_grants_for(user_id, service).await {
        Ok(grants) => grants,
        Err(e) => {
            warn!(user_id, service = %service, error = %e,
                "promo-grant lookup failed — resolving to default tier");
            return effective_entitlement(false, &[], &[], now);
        }
    };

    let subscriptions = match state.db.subscriptions_for(user_id, service).await {
        Ok(subscriptions) => subscriptions,
        Err(e) => {
            warn!(user_id, service = %service, error = %e,
                "subscription lookup failed — resolving to default tier");
            // An active grant alone may still elevate; subscriptions are
            // simply absent from this resolution.
            return effective_entitlement(false, &grants, &[], now);
        }
    };

    effective_entitlement(false, &grants, &subscriptions, now)
}
