//! The quota ledger: recompute usage from the append-only log and compare
//! against the plan catalog.

use chrono::Utc;
use tracing::{debug, warn};

use quillgate_core::plan::{cap_allows, PlanTier};
use quillgate_core::quota::{day_window_start, DenyReason, QuotaDecision, UsageCategory};
use quillgate_core::service::Service;

use crate::state::AppState;

/// Check whether one more event in `category` is within the caller's caps.
///
/// Usage is counted from `usage_events` rows on every check — no cached
/// counter exists to drift. Two concurrent requests can both pass before
/// either's event is visible; that short race window is an accepted
/// trade-off of the stateless-worker model.
///
/// A windowed category must pass its own cap AND the aggregate
/// `total_daily_cap` independently; neither is ever derived from the other,
/// so categories can be added without rewriting the ledger.
/// `content_creation` checks its all-time cap only.
///
/// Never errors: datastore failure denies with `datastore-unavailable`
/// (fail-closed, retryable) and a brand-new account simply counts zero rows
/// against the default-tier caps.
pub async fn check(
    state: &AppState,
    user_id: &str,
    service: Service,
    category: UsageCategory,
    tier: PlanTier,
) -> QuotaDecision {
    let limits = match state.limits_for(service, tier).await {
        Ok(limits) => limits,
        Err(e) => {
            warn!(user_id, service = %service, error = %e,
                "plan-limits read failed — denying quota check");
            return QuotaDecision::deny(DenyReason::DatastoreUnavailable, 0, 0);
        }
    };

    // The kill-switch overrides every numeric cap, including -1.
    if !limits.ai_enabled {
        debug!(user_id, service = %service, tier = %tier, "ai disabled for tier");
        return QuotaDecision::deny(DenyReason::AiDisabledForTier, 0, limits.cap_for(category));
    }

    let cap = limits.cap_for(category);

    if category == UsageCategory::ContentCreation {
        // All-time count; no window.
        let used = match state.db.count_usage(user_id, service, category, None).await {
            Ok(used) => used,
            Err(e) => {
                warn!(user_id, error = %e, "usage count failed — denying quota check");
                return QuotaDecision::deny(DenyReason::DatastoreUnavailable, 0, cap);
            }
        };
        if !cap_allows(cap, used) {
            return QuotaDecision::deny(DenyReason::ContentCapReached, used, cap);
        }
        return QuotaDecision::allow(used, cap);
    }

    let window_start = day_window_start(Utc::now(), state.config.quota_utc_offset_minutes);

    let used = match state
        .db
        .count_usage(user_id, service, category, Some(window_start))
        .await
    {
        Ok(used) => used,
        Err(e) => {
            warn!(user_id, error = %e, "usage count failed — denying quota check");
            return QuotaDecision::deny(DenyReason::DatastoreUnavailable, 0, cap);
        }
    };
    if !cap_allows(cap, used) {
        debug!(user_id, category = %category, used, cap, "category cap reached");
        return QuotaDecision::deny(DenyReason::CategoryLimitReached, used, cap);
    }

    let total_used = match state.db.count_usage_total(user_id, service, window_start).await {
        Ok(total) => total,
        Err(e) => {
            warn!(user_id, error = %e, "total usage count failed — denying quota check");
            return QuotaDecision::deny(DenyReason::DatastoreUnavailable, 0, limits.total_daily_cap);
        }
    };
    if !cap_allows(limits.total_daily_cap, total_used) {
        debug!(user_id, total_used, total_cap = limits.total_daily_cap, "total cap reached");
        return QuotaDecision::deny(
            DenyReason::TotalLimitReached,
            total_used,
            limits.total_daily_cap,
        );
    }

    // Reported used/limit stay the category's own numbers; the total cap is
    // an extra gate, not the headline.
    QuotaDecision::allow(used, cap)
}
