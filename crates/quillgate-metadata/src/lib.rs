use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use quillgate_core::entitlement::{PromoGrant, Subscription, SubscriptionStatus};
use quillgate_core::plan::{PlanLimits, PlanTier};
use quillgate_core::provider::Phase;
use quillgate_core::service::Service;

/// A persisted plan-limits row: [`PlanLimits`] plus its catalog key and
/// version. Edits insert a new version rather than mutating in place, so the
/// catalog history stays auditable.
#[derive(Debug, Clone, Serialize)]
pub struct PlanLimitsRecord {
    pub service: Service,
    pub plan_tier: PlanTier,
    pub version: i64,
    pub is_active: bool,
    pub limits: PlanLimits,
    pub updated_at: String,
}

/// A persisted provider routing row for (service, tier, phase).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderModelSetting {
    pub service: Service,
    pub plan_tier: PlanTier,
    pub phase: Phase,
    pub primary_provider: String,
    pub primary_model: String,
    pub backup_provider: String,
    pub backup_model: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct UpsertProviderSettingParams {
    pub primary_provider: String,
    pub primary_model: String,
    pub backup_provider: String,
    pub backup_model: String,
}

#[derive(Debug, Clone)]
pub struct CreatePromoGrantParams {
    pub user_id: String,
    pub service: Service,
    pub granted_tier: PlanTier,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertSubscriptionParams {
    pub user_id: String,
    pub service: Service,
    pub plan_tier: PlanTier,
    pub status: SubscriptionStatus,
    pub current_period_end: DateTime<Utc>,
}

/// Storage interface for the governance metadata the engine reads:
/// the plan-limits catalog, entitlement grant rows, and provider routing
/// settings.
///
/// The engine treats all of this as read-only; the write methods exist for
/// the administration and billing surfaces that own the rows (and for
/// tests). DuckDB implements this in self-hosted deployments; a hosted
/// control plane can swap in another relational store without touching the
/// engine.
#[async_trait]
pub trait GovernanceStore: Send + Sync + 'static {
    /// The active plan-limits row with the highest version for the key, or
    /// `None` when the catalog has no row (callers fall back to
    /// [`PlanLimits::defaults`]).
    async fn get_plan_limits(
        &self,
        service: Service,
        tier: PlanTier,
    ) -> anyhow::Result<Option<PlanLimitsRecord>>;

    /// Insert a new version for (service, tier) and mark it active.
    async fn upsert_plan_limits(
        &self,
        service: Service,
        tier: PlanTier,
        limits: PlanLimits,
    ) -> anyhow::Result<PlanLimitsRecord>;

    async fn list_plan_limits(&self, service: Service) -> anyhow::Result<Vec<PlanLimitsRecord>>;

    /// Every promo grant row for (user, service), active or not. Validity
    /// filtering is the resolver's job so the precedence rule stays pure.
    async fn promo_grants_for(
        &self,
        user_id: &str,
        service: Service,
    ) -> anyhow::Result<Vec<PromoGrant>>;

    async fn create_promo_grant(
        &self,
        params: CreatePromoGrantParams,
    ) -> anyhow::Result<PromoGrant>;

    /// Every subscription row for (user, service), any status.
    async fn subscriptions_for(
        &self,
        user_id: &str,
        service: Service,
    ) -> anyhow::Result<Vec<Subscription>>;

    /// One subscription per (user, service); replaces any existing row.
    async fn upsert_subscription(
        &self,
        params: UpsertSubscriptionParams,
    ) -> anyhow::Result<Subscription>;

    /// Exact-key routing lookup. Alias resolution happens above this layer.
    async fn get_provider_setting(
        &self,
        service: Service,
        tier: PlanTier,
        phase: Phase,
    ) -> anyhow::Result<Option<ProviderModelSetting>>;

    async fn upsert_provider_setting(
        &self,
        service: Service,
        tier: PlanTier,
        phase: Phase,
        params: UpsertProviderSettingParams,
    ) -> anyhow::Result<ProviderModelSetting>;

    async fn list_provider_settings(
        &self,
        service: Service,
    ) -> anyhow::Result<Vec<ProviderModelSetting>>;
}
