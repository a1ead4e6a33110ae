use thiserror::Error;

use crate::plan::PlanTier;
use crate::provider::Phase;
use crate::quota::{DenyReason, UsageCategory};
use crate::service::Service;

/// The engine's error taxonomy.
///
/// Quota and kill-switch denials carry enough structure for feature handlers
/// to build their own user-facing payloads ("upgrade your plan") and are
/// distinct from transient unavailability ("try again shortly"). Usage-log
/// write failures never appear here — they are logged and swallowed by the
/// executor.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("quota exceeded for {category}: {used}/{limit}")]
    QuotaExceeded {
        category: UsageCategory,
        reason: DenyReason,
        used: i64,
        limit: i64,
    },

    #[error("ai generation is disabled for this plan tier")]
    AiDisabledForTier,

    /// Neither a settings row nor a usable hardcoded default exists for the
    /// route. A configuration bug — a new phase or service landed without
    /// matching defaults — surfaced loudly instead of silently routed.
    #[error("no provider configured for {service}/{tier}/{phase}")]
    ProviderConfigMissing {
        service: Service,
        tier: PlanTier,
        phase: Phase,
    },

    /// Both the primary and the backup provider failed. Not retried further:
    /// a second failure implies a systemic issue, not transient noise.
    #[error("generation unavailable (primary: {primary}; backup: {backup})")]
    GenerationUnavailable { primary: String, backup: String },

    #[error("datastore unavailable: {0}")]
    DatastoreUnavailable(String),
}
