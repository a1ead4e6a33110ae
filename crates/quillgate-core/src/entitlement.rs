//! Entitlement grants and the precedence rule that picks one of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::PlanTier;
use crate::service::Service;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim() {
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            other => anyhow::bail!("unknown subscription status: {other}"),
        }
    }

    /// Statuses that confer entitlement. `past_due` deliberately does not —
    /// dunning is the billing surface's problem, not the engine's.
    pub fn entitles(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

/// A paid subscription row. Owned by the billing surface; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub service: Service,
    pub plan_tier: PlanTier,
    pub status: SubscriptionStatus,
    pub current_period_end: DateTime<Utc>,
}

/// A time-boxed promotional override, granted administratively and
/// independent of payment status. Owned by the promotion surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoGrant {
    pub id: String,
    pub user_id: String,
    pub service: Service,
    pub granted_tier: PlanTier,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl PromoGrant {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now < self.valid_until
    }
}

/// Which of the three independent sources won the resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementSource {
    Staff,
    PromoGrant,
    Subscription,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedEntitlement {
    pub plan_tier: PlanTier,
    pub source: EntitlementSource,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Pick the single effective entitlement from pre-fetched rows.
///
/// Precedence, first match wins:
/// 1. administrator allow-list → the synthetic unlimited tier;
/// 2. promotional grant active at `now` (ties broken by latest
///    `valid_until`);
/// 3. subscription whose status entitles (ties broken by latest
///    `current_period_end`);
/// 4. the default tier.
///
/// Sources are never merged; a user holding an expired promo plus an active
/// subscription resolves to the subscription. Pure — datastore fetching and
/// failure policy live with the caller.
pub fn effective_entitlement(
    is_admin: bool,
    grants: &[PromoGrant],
    subscriptions: &[Subscription],
    now: DateTime<Utc>,
) -> ResolvedEntitlement {
    if is_admin {
        return ResolvedEntitlement {
            plan_tier: PlanTier::Staff,
            source: EntitlementSource::Staff,
            expires_at: None,
        };
    }

    if let Some(grant) = grants
        .iter()
        .filter(|g| g.is_active_at(now))
        .max_by_key(|g| g.valid_until)
    {
        return ResolvedEntitlement {
            plan_tier: grant.granted_tier,
            source: EntitlementSource::PromoGrant,
            expires_at: Some(grant.valid_until),
        };
    }

    if let Some(sub) = subscriptions
        .iter()
        .filter(|s| s.status.entitles())
        .max_by_key(|s| s.current_period_end)
    {
        return ResolvedEntitlement {
            plan_tier: sub.plan_tier,
            source: EntitlementSource::Subscription,
            expires_at: Some(sub.current_period_end),
        };
    }

    ResolvedEntitlement {
        plan_tier: PlanTier::Free,
        source: EntitlementSource::Default,
        expires_at: None,
    }
}
