//! Quota decision types and the day-window boundary.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Named bucket of AI actions with its own daily cap.
///
/// The credit categories gate access to higher- vs lower-cost model classes
/// within one product surface; from the ledger's point of view they are just
/// categories with their own caps. `content_creation` is the one non-windowed
/// category: its cap is an all-time count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageCategory {
    Text,
    Image,
    PremiumCredit,
    StandardCredit,
    ContentCreation,
}

impl UsageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageCategory::Text => "text",
            UsageCategory::Image => "image",
            UsageCategory::PremiumCredit => "premium_credit",
            UsageCategory::StandardCredit => "standard_credit",
            UsageCategory::ContentCreation => "content_creation",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "text" => Ok(UsageCategory::Text),
            "image" => Ok(UsageCategory::Image),
            "premium_credit" => Ok(UsageCategory::PremiumCredit),
            "standard_credit" => Ok(UsageCategory::StandardCredit),
            "content_creation" => Ok(UsageCategory::ContentCreation),
            other => Err(anyhow!("unknown usage category: {other}")),
        }
    }

    /// Whether usage in this category is counted inside the rolling day
    /// window. `content_creation` counts all-time.
    pub fn is_windowed(&self) -> bool {
        !matches!(self, UsageCategory::ContentCreation)
    }
}

impl std::fmt::Display for UsageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable denial reason. Feature handlers translate these into
/// their own user-facing payloads; the engine never formats messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    AiDisabledForTier,
    CategoryLimitReached,
    TotalLimitReached,
    ContentCapReached,
    /// The ledger could not read the usage log. Retryable — distinct from a
    /// hard quota message so callers don't tell users to upgrade.
    DatastoreUnavailable,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::AiDisabledForTier => "ai-disabled-for-tier",
            DenyReason::CategoryLimitReached => "category-limit-reached",
            DenyReason::TotalLimitReached => "total-limit-reached",
            DenyReason::ContentCapReached => "content-cap-reached",
            DenyReason::DatastoreUnavailable => "datastore-unavailable",
        }
    }

    /// Denials that clear on their own (window rollover or infrastructure
    /// recovery) versus ones that need a plan change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DenyReason::DatastoreUnavailable)
    }
}

/// Outcome of one ledger check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub used: i64,
    pub limit: i64,
    pub reason: Option<DenyReason>,
}

impl QuotaDecision {
    pub fn allow(used: i64, limit: i64) -> Self {
        Self {
            allowed: true,
            used,
            limit,
            reason: None,
        }
    }

    pub fn deny(reason: DenyReason, used: i64, limit: i64) -> Self {
        Self {
            allowed: false,
            used,
            limit,
            reason: Some(reason),
        }
    }
}

/// Start of the current quota day for `now`.
///
/// The day boundary is midnight-aligned at a fixed offset from UTC,
/// configured once (`QUILLGATE_QUOTA_UTC_OFFSET_MINUTES`) and applied
/// uniformly to every windowed count. Positive offsets move the boundary
/// east of UTC.
pub fn day_window_start(now: DateTime<Utc>, offset_minutes: i32) -> DateTime<Utc> {
    let offset = Duration::minutes(i64::from(offset_minutes));
    let shifted = now + offset;
    let midnight = shifted
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc();
    midnight - offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_window_start_utc_midnight() {
        let now = utc(2025, 6, 15, 13, 45);
        assert_eq!(day_window_start(now, 0), utc(2025, 6, 15, 0, 0));
    }

    #[test]
    fn test_window_start_exactly_at_midnight() {
        let now = utc(2025, 6, 15, 0, 0);
        assert_eq!(day_window_start(now, 0), utc(2025, 6, 15, 0, 0));
    }

    #[test]
    fn test_positive_offset_shifts_boundary_west_in_utc() {
        // UTC+2: local midnight falls at 22:00 UTC the previous day.
        let now = utc(2025, 6, 15, 13, 45);
        assert_eq!(day_window_start(now, 120), utc(2025, 6, 14, 22, 0));

        // At 23:30 UTC the local day has already rolled over.
        let late = utc(2025, 6, 15, 23, 30);
        assert_eq!(day_window_start(late, 120), utc(2025, 6, 15, 22, 0));
    }

    #[test]
    fn test_negative_offset() {
        // UTC-5: at 03:00 UTC it is still the previous local day.
        let now = utc(2025, 6, 15, 3, 0);
        assert_eq!(day_window_start(now, -300), utc(2025, 6, 14, 5, 0));
    }

    #[test]
    fn test_window_rolls_over_across_days() {
        let before = utc(2025, 6, 15, 23, 59);
        let after = utc(2025, 6, 16, 0, 1);
        assert_ne!(day_window_start(before, 0), day_window_start(after, 0));
    }

    #[test]
    fn test_reason_codes_are_stable() {
        assert_eq!(DenyReason::AiDisabledForTier.as_str(), "ai-disabled-for-tier");
        assert_eq!(DenyReason::CategoryLimitReached.as_str(), "category-limit-reached");
        assert_eq!(DenyReason::TotalLimitReached.as_str(), "total-limit-reached");
        assert_eq!(DenyReason::ContentCapReached.as_str(), "content-cap-reached");
        assert_eq!(DenyReason::DatastoreUnavailable.as_str(), "datastore-unavailable");
        assert!(DenyReason::DatastoreUnavailable.is_retryable());
        assert!(!DenyReason::CategoryLimitReached.is_retryable());
    }

    #[test]
    fn test_deny_reason_serializes_kebab_case() {
        let json = serde_json::to_string(&DenyReason::CategoryLimitReached).unwrap();
        assert_eq!(json, "\"category-limit-reached\"");
    }
}
