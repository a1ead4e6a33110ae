//! Provider/model resolution: alias table → settings row → hardcoded
//! default.

use tracing::debug;

use quillgate_core::error::GovernanceError;
use quillgate_core::plan::PlanTier;
use quillgate_core::provider::{default_pair, preset_alias, Phase, ProviderPair};
use quillgate_core::service::Service;

use crate::state::AppState;

/// Resolve the (primary, backup) route for one generation call.
///
/// The alias table rewrites the lookup key first, so an aliased sub-plan
/// follows its target's settings rows *and* defaults. Then: exact-key
/// settings row (TTL-cached) → hardcoded per-phase default →
/// [`GovernanceError::ProviderConfigMissing`].
///
/// Pure datastore read plus deterministic fallback; no network calls.
pub async fn resolve(
    state: &AppState,
    service: Service,
    tier: PlanTier,
    phase: Phase,
) -> Result<ProviderPair, GovernanceError> {
    let (lookup_service, lookup_tier) = match preset_alias(service, tier) {
        Some((aliased_service, aliased_tier)) => {
            debug!(
                service = %service, tier = %tier,
                aliased_service = %aliased_service, aliased_tier = %aliased_tier,
                "preset alias applied"
            );
            (aliased_service, aliased_tier)
        }
        None => (service, tier),
    };

    match state
        .provider_setting_for(lookup_service, lookup_tier, phase)
        .await
    {
        Ok(Some(pair)) => return Ok(pair),
        Ok(None) => {}
        Err(e) => {
            // The routing table being unreadable is not a quota question;
            // fall through to the deterministic defaults so generation keeps
            // working while the datastore misbehaves.
            tracing::warn!(
                service = %lookup_service, tier = %lookup_tier, phase = %phase, error = %e,
                "provider-settings read failed — using hardcoded defaults"
            );
        }
    }

    default_pair(lookup_service, phase).ok_or(GovernanceError::ProviderConfigMissing {
        service,
        tier,
        phase,
    })
}
