//! Trait implementations for [`DuckDbBackend`].
//!
//! The inherent methods live next to their SQL in the per-table modules;
//! these impls only delegate so the backend can be held as
//! `Arc<dyn GovernanceStore>` / `Arc<dyn UsageStore>` in `AppState`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use quillgate_core::entitlement::{PromoGrant, Subscription};
use quillgate_core::plan::{PlanLimits, PlanTier};
use quillgate_core::provider::Phase;
use quillgate_core::quota::UsageCategory;
use quillgate_core::service::Service;
use quillgate_core::usage::{UsageEvent, UsageReportFilter, UsageReportRow, UsageStore};
use quillgate_metadata::{
    CreatePromoGrantParams, GovernanceStore, PlanLimitsRecord, ProviderModelSetting,
    UpsertProviderSettingParams, UpsertSubscriptionParams,
};

use crate::DuckDbBackend;

#[async_trait]
impl GovernanceStore for DuckDbBackend {
    async fn get_plan_limits(
        &self,
        service: Service,
        tier: PlanTier,
    ) -> Result<Option<PlanLimitsRecord>> {
        DuckDbBackend::get_plan_limits(self, service, tier).await
    }

    async fn upsert_plan_limits(
        &self,
        service: Service,
        tier: PlanTier,
        limits: PlanLimits,
    ) -> Result<PlanLimitsRecord> {
        DuckDbBackend::upsert_plan_limits(self, service, tier, limits).await
    }

    async fn list_plan_limits(&self, service: Service) -> Result<Vec<PlanLimitsRecord>> {
        DuckDbBackend::list_plan_limits(self, service).await
    }

    async fn promo_grants_for(
        &self,
        user_id: &str,
        service: Service,
    ) -> Result<Vec<PromoGrant>> {
        DuckDbBackend::promo_grants_for(self, user_id, service).await
    }

    async fn create_promo_grant(&self, params: CreatePromoGrantParams) -> Result<PromoGrant> {
        DuckDbBackend::create_promo_grant(self, params).await
    }

    async fn subscriptions_for(
        &self,
        user_id: &str,
        service: Service,
    ) -> Result<Vec<Subscription>> {
        DuckDbBackend::subscriptions_for(self, user_id, service).await
    }

    async fn upsert_subscription(
        &self,
        params: UpsertSubscriptionParams,
    ) -> Result<Subscription> {
        DuckDbBackend::upsert_subscription(self, params).await
    }

    async fn get_provider_setting(
        &self,
        service: Service,
        tier: PlanTier,
        phase: Phase,
    ) -> Result<Option<ProviderModelSetting>> {
        DuckDbBackend::get_provider_setting(self, service, tier, phase).await
    }

    async fn upsert_provider_setting(
        &self,
        service: Service,
        tier: PlanTier,
        phase: Phase,
        params: UpsertProviderSettingParams,
    ) -> Result<ProviderModelSetting> {
        DuckDbBackend::upsert_provider_setting(self, service, tier, phase, params).await
    }

    async fn list_provider_settings(
        &self,
        service: Service,
    ) -> Result<Vec<ProviderModelSetting>> {
        DuckDbBackend::list_provider_settings(self, service).await
    }
}

#[async_trait]
impl UsageStore for DuckDbBackend {
    async fn append_usage(&self, event: &UsageEvent) -> Result<()> {
        DuckDbBackend::append_usage(self, event).await
    }

    async fn count_usage(
        &self,
        user_id: &str,
        service: Service,
        category: UsageCategory,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        DuckDbBackend::count_usage(self, user_id, service, category, since).await
    }

    async fn count_usage_total(
        &self,
        user_id: &str,
        service: Service,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        DuckDbBackend::count_usage_total(self, user_id, service, since).await
    }

    async fn usage_report(&self, filter: &UsageReportFilter) -> Result<Vec<UsageReportRow>> {
        DuckDbBackend::usage_report(self, filter).await
    }
}
