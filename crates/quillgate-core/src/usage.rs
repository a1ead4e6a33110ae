//! The append-only usage log: event type, store trait, token/cost helpers.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::quota::UsageCategory;
use crate::service::Service;

/// One completed AI call. Mirrors the `usage_events` table columns exactly.
///
/// Rows are append-only and are the sole source of truth for usage — there is
/// no mutable counter to drift under concurrent writes or crashes. Written
/// exclusively by the generation executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: String,
    pub user_id: String,
    pub service: Service,
    pub category: UsageCategory,
    pub provider: String,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_minor_units: i64,
    pub created_at: DateTime<Utc>,
}

impl UsageEvent {
    pub fn new(
        user_id: &str,
        service: Service,
        category: UsageCategory,
        provider: &str,
        model: &str,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            service,
            category,
            provider: provider.to_string(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost_minor_units: cost_minor_units(provider, model, input_tokens, output_tokens),
            created_at: Utc::now(),
        }
    }
}

/// Filter for the reporting aggregation.
#[derive(Debug, Clone)]
pub struct UsageReportFilter {
    pub service: Option<Service>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One aggregated row: (day, service, category, provider, model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReportRow {
    pub day: String,
    pub service: String,
    pub category: String,
    pub provider: String,
    pub model: String,
    pub calls: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_minor_units: i64,
}

/// Usage-log access. DuckDB implements this; the ledger and the executor
/// only see the trait so tests can swap in-memory databases freely.
#[async_trait]
pub trait UsageStore: Send + Sync + 'static {
    /// Append one event. Inserts never conflict (no unique constraints
    /// beyond the id), so concurrent appends need no locking.
    async fn append_usage(&self, event: &UsageEvent) -> Result<()>;

    /// Count events for one (user, service, category). `since = None` counts
    /// all-time (used for the content-creation cap); otherwise counts rows
    /// with `created_at >= since`.
    async fn count_usage(
        &self,
        user_id: &str,
        service: Service,
        category: UsageCategory,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64>;

    /// Count events across all windowed categories for one (user, service)
    /// with `created_at >= since`. Excludes `content_creation` so the
    /// aggregate cap never double-charges the all-time cap.
    async fn count_usage_total(
        &self,
        user_id: &str,
        service: Service,
        since: DateTime<Utc>,
    ) -> Result<i64>;

    /// Aggregate rows grouped by (day, service, category, provider, model)
    /// for the reporting surface.
    async fn usage_report(&self, filter: &UsageReportFilter) -> Result<Vec<UsageReportRow>>;
}

/// Rough token estimate for providers that don't report usage metadata.
/// The industry rule of thumb: one token per ~4 characters.
pub fn estimate_tokens(text: &str) -> i64 {
    ((text.chars().count() + 3) / 4) as i64
}

/// Cost of a call in minor currency units (cents), from a pure per-model
/// rate table. Rates are minor units per million tokens. Unknown models cost
/// zero — reporting marks them, billing ignores them.
pub fn cost_minor_units(provider: &str, model: &str, input_tokens: i64, output_tokens: i64) -> i64 {
    let (input_rate, output_rate) = match (provider, model) {
        ("openai", "gpt-4o") => (250, 1000),
        ("openai", "gpt-4o-mini") => (15, 60),
        ("anthropic", "claude-3-7-sonnet") => (300, 1500),
        ("anthropic", "claude-3-5-haiku") => (80, 400),
        _ => (0, 0),
    };
    (input_tokens * input_rate + output_tokens * output_rate) / 1_000_000
}
