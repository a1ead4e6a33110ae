//! Promo-grant and subscription queries.
//!
//! These tables are owned by the promotion and billing surfaces; the engine
//! only reads them. The write methods here are the surfaces' entry points
//! (and the test fixtures').

use anyhow::Result;

use quillgate_core::entitlement::{PromoGrant, Subscription, SubscriptionStatus};
use quillgate_core::plan::PlanTier;
use quillgate_core::service::Service;
use quillgate_metadata::{CreatePromoGrantParams, UpsertSubscriptionParams};

use crate::backend::{format_ts, parse_ts, rand_hex};
use crate::DuckDbBackend;

struct RawGrantRow {
    id: String,
    user_id: String,
    service: String,
    granted_tier: String,
    valid_from: String,
    valid_until: String,
}

impl RawGrantRow {
    fn into_grant(self) -> Result<PromoGrant> {
        Ok(PromoGrant {
            id: self.id,
            user_id: self.user_id,
            service: Service::parse(&self.service)?,
            granted_tier: PlanTier::parse(&self.granted_tier)?,
            valid_from: parse_ts(&self.valid_from)?,
            valid_until: parse_ts(&self.valid_until)?,
        })
    }
}

struct RawSubscriptionRow {
    id: String,
    user_id: String,
    service: String,
    plan_tier: String,
    status: String,
    current_period_end: String,
}

impl RawSubscriptionRow {
    fn into_subscription(self) -> Result<Subscription> {
        Ok(Subscription {
            id: self.id,
            user_id: self.user_id,
            service: Service::parse(&self.service)?,
            plan_tier: PlanTier::parse(&self.plan_tier)?,
            status: SubscriptionStatus::parse(&self.status)?,
            current_period_end: parse_ts(&self.current_period_end)?,
        })
    }
}

impl DuckDbBackend {
    /// Every grant row for (user, service), active or expired.
    pub async fn promo_grants_for(
        &self,
        user_id: &str,
        service: Service,
    ) -> Result<Vec<PromoGrant>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, service, granted_tier, \
                    CAST(valid_from AS VARCHAR), CAST(valid_until AS VARCHAR) \
             FROM promo_grants WHERE user_id = ?1 AND service = ?2",
        )?;
        let rows = stmt.query_map(duckdb::params![user_id, service.as_str()], |row| {
            Ok(RawGrantRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                service: row.get(2)?,
                granted_tier: row.get(3)?,
                valid_from: row.get(4)?,
                valid_until: row.get(5)?,
            })
        })?;
        let mut grants = Vec::new();
        for raw in rows {
            grants.push(raw?.into_grant()?);
        }
        Ok(grants)
    }

    pub async fn create_promo_grant(&self, params: CreatePromoGrantParams) -> Result<PromoGrant> {
        let conn = self.conn.lock().await;
        let id = format!("grant_{}", rand_hex(5));
        conn.execute(
            "INSERT INTO promo_grants (id, user_id, service, granted_tier, valid_from, valid_until) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            duckdb::params![
                id,
                params.user_id,
                params.service.as_str(),
                params.granted_tier.as_str(),
                format_ts(params.valid_from),
                format_ts(params.valid_until),
            ],
        )?;
        Ok(PromoGrant {
            id,
            user_id: params.user_id,
            service: params.service,
            granted_tier: params.granted_tier,
            valid_from: params.valid_from,
            valid_until: params.valid_until,
        })
    }

    /// Every subscription row for (user, service), any status.
    pub async fn subscriptions_for(
        &self,
        user_id: &str,
        service: Service,
    ) -> Result<Vec<Subscription>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, service, plan_tier, status, \
                    CAST(current_period_end AS VARCHAR) \
             FROM subscriptions WHERE user_id = ?1 AND service = ?2",
        )?;
        let rows = stmt.query_map(duckdb::params![user_id, service.as_str()], |row| {
            Ok(RawSubscriptionRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                service: row.get(2)?,
                plan_tier: row.get(3)?,
                status: row.get(4)?,
                current_period_end: row.get(5)?,
            })
        })?;
        let mut subscriptions = Vec::new();
        for raw in rows {
            subscriptions.push(raw?.into_subscription()?);
        }
        Ok(subscriptions)
    }

    /// One row per (user, service); the billing webhook replaces it on every
    /// state change.
    pub async fn upsert_subscription(
        &self,
        params: UpsertSubscriptionParams,
    ) -> Result<Subscription> {
        let conn = self.conn.lock().await;
        let id = format!("sub_{}", rand_hex(5));
        conn.execute(
            "INSERT OR REPLACE INTO subscriptions \
                (id, user_id, service, plan_tier, status, current_period_end, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP)",
            duckdb::params![
                id,
                params.user_id,
                params.service.as_str(),
                params.plan_tier.as_str(),
                params.status.as_str(),
                format_ts(params.current_period_end),
            ],
        )?;
        Ok(Subscription {
            id,
            user_id: params.user_id,
            service: params.service,
            plan_tier: params.plan_tier,
            status: params.status,
            current_period_end: params.current_period_end,
        })
    }
}
