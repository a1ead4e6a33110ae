//! Plan tiers and the limits catalog.

use serde::{Deserialize, Serialize};

use crate::quota::UsageCategory;
use crate::service::Service;

/// Cap value meaning "no limit" for any numeric cap in [`PlanLimits`].
pub const UNLIMITED: i64 = -1;

/// Named bundle of limits. Additive; a user's tier is immutable within a
/// billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Standard,
    Premium,
    Enterprise,
    /// Time-boxed onboarding variant, granted promotionally.
    LaunchTrial,
    /// Synthetic unlimited tier for the administrator allow-list.
    /// Never persisted in a subscription or grant row.
    Staff,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Standard => "standard",
            PlanTier::Premium => "premium",
            PlanTier::Enterprise => "enterprise",
            PlanTier::LaunchTrial => "launch_trial",
            PlanTier::Staff => "staff",
        }
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim() {
            "free" => Ok(PlanTier::Free),
            "standard" => Ok(PlanTier::Standard),
            "premium" => Ok(PlanTier::Premium),
            "enterprise" => Ok(PlanTier::Enterprise),
            "launch_trial" => Ok(PlanTier::LaunchTrial),
            "staff" => Ok(PlanTier::Staff),
            other => anyhow::bail!("unknown plan tier: {other}"),
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The limits attached to one (service, tier) pair.
///
/// Each cap is enforced independently — there is no derived consistency
/// between the category caps and `total_daily_cap`. `-1` means unlimited.
/// `ai_enabled = false` denies every check for the tier regardless of the
/// numeric caps, so administrators can switch a tier off without editing
/// every cap to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// All-time cap on content items created (books, campaigns, quizzes).
    /// Not windowed.
    pub content_creation_cap: i64,
    pub text_daily_cap: i64,
    pub image_daily_cap: i64,
    /// Aggregate cap across all windowed categories.
    pub total_daily_cap: i64,
    pub premium_credit_daily_cap: i64,
    pub standard_credit_daily_cap: i64,
    pub ai_enabled: bool,
}

impl PlanLimits {
    /// Hardcoded fallback catalog, used when the `plan_limits` table has no
    /// active row for (service, tier) — an unmigrated deployment or a tier
    /// added in code before the catalog row landed.
    ///
    /// Pure and stateless; never read from process globals.
    pub fn defaults(service: Service, tier: PlanTier) -> PlanLimits {
        // Defaults are currently identical across services; the match is on
        // (service, tier) so a per-service override stays a one-line change.
        match (service, tier) {
            (_, PlanTier::Free) => PlanLimits {
                content_creation_cap: 3,
                text_daily_cap: 3,
                image_daily_cap: 1,
                total_daily_cap: 5,
                premium_credit_daily_cap: 0,
                standard_credit_daily_cap: 10,
                ai_enabled: true,
            },
            (_, PlanTier::Standard) => PlanLimits {
                content_creation_cap: 25,
                text_daily_cap: 25,
                image_daily_cap: 10,
                total_daily_cap: 40,
                premium_credit_daily_cap: 5,
                standard_credit_daily_cap: 100,
                ai_enabled: true,
            },
            (_, PlanTier::Premium) => PlanLimits {
                content_creation_cap: UNLIMITED,
                text_daily_cap: 100,
                image_daily_cap: 40,
                total_daily_cap: 150,
                premium_credit_daily_cap: 40,
                standard_credit_daily_cap: UNLIMITED,
                ai_enabled: true,
            },
            (_, PlanTier::LaunchTrial) => PlanLimits {
                content_creation_cap: 10,
                text_daily_cap: 100,
                image_daily_cap: 40,
                total_daily_cap: 150,
                premium_credit_daily_cap: 40,
                standard_credit_daily_cap: UNLIMITED,
                ai_enabled: true,
            },
            (_, PlanTier::Enterprise) | (_, PlanTier::Staff) => PlanLimits {
                content_creation_cap: UNLIMITED,
                text_daily_cap: UNLIMITED,
                image_daily_cap: UNLIMITED,
                total_daily_cap: UNLIMITED,
                premium_credit_daily_cap: UNLIMITED,
                standard_credit_daily_cap: UNLIMITED,
                ai_enabled: true,
            },
        }
    }

    /// The cap governing a single category check. The aggregate
    /// `total_daily_cap` is checked separately by the ledger.
    pub fn cap_for(&self, category: UsageCategory) -> i64 {
        match category {
            UsageCategory::Text => self.text_daily_cap,
            UsageCategory::Image => self.image_daily_cap,
            UsageCategory::PremiumCredit => self.premium_credit_daily_cap,
            UsageCategory::StandardCredit => self.standard_credit_daily_cap,
            UsageCategory::ContentCreation => self.content_creation_cap,
        }
    }
}

/// `true` when `used` is still under `cap`. A cap of [`UNLIMITED`] always
/// passes regardless of historical volume.
pub fn cap_allows(cap: i64, used: i64) -> bool {
    cap == UNLIMITED || used < cap
}
