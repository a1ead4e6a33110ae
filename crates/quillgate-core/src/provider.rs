//! Provider/model routing: phases, pairs, the preset alias table, and the
//! hardcoded per-phase defaults.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::plan::PlanTier;
use crate::service::Service;

/// A named generation-workflow stage. Different stages warrant different
/// default models (outlining is cheap and structural, writing is where the
/// quality budget goes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Outline,
    Writing,
    Revision,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Outline => "outline",
            Phase::Writing => "writing",
            Phase::Revision => "revision",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "outline" => Ok(Phase::Outline),
            "writing" => Ok(Phase::Writing),
            "revision" => Ok(Phase::Revision),
            other => Err(anyhow!("unknown phase: {other}")),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Primary and backup (provider, model) for one resolved route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPair {
    pub primary_provider: String,
    pub primary_model: String,
    pub backup_provider: String,
    pub backup_model: String,
}

impl ProviderPair {
    pub fn new(
        primary_provider: &str,
        primary_model: &str,
        backup_provider: &str,
        backup_model: &str,
    ) -> Self {
        Self {
            primary_provider: primary_provider.to_string(),
            primary_model: primary_model.to_string(),
            backup_provider: backup_provider.to_string(),
            backup_model: backup_model.to_string(),
        }
    }
}

/// Preset aliasing: some (service, tier) combinations reuse another
/// combination's provider settings instead of carrying their own rows.
///
/// Consulted before the settings lookup. Kept as one enumerable table —
/// never inline conditionals — so the rule stays auditable and testable in
/// isolation. At most one hop; alias targets must not themselves alias.
pub fn preset_alias(service: Service, tier: PlanTier) -> Option<(Service, PlanTier)> {
    match (service, tier) {
        // Quiz premium sub-plans ride on the books presets; the quiz surface
        // sells them as an add-on to the book studio.
        (Service::Quiz, PlanTier::Premium) => Some((Service::Books, PlanTier::Premium)),
        (Service::Quiz, PlanTier::Enterprise) => Some((Service::Books, PlanTier::Enterprise)),
        _ => None,
    }
}

/// Hardcoded default route for (service, phase), used when no
/// `ProviderModelSetting` row exists.
///
/// The table is partial: a phase a service does not support has no default,
/// and resolving it without a settings row is a configuration bug
/// (`ProviderConfigMissing`), surfaced loudly rather than silently routed.
pub fn default_pair(service: Service, phase: Phase) -> Option<ProviderPair> {
    match (service, phase) {
        (_, Phase::Outline) => Some(ProviderPair::new(
            "openai",
            "gpt-4o-mini",
            "anthropic",
            "claude-3-5-haiku",
        )),
        (_, Phase::Writing) => Some(ProviderPair::new(
            "anthropic",
            "claude-3-7-sonnet",
            "openai",
            "gpt-4o",
        )),
        // Revision is a books-only workflow stage.
        (Service::Books, Phase::Revision) => Some(ProviderPair::new(
            "openai",
            "gpt-4o",
            "anthropic",
            "claude-3-7-sonnet",
        )),
        (Service::Ads | Service::Quiz, Phase::Revision) => None,
    }
}
