use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// A product line sharing the governance engine.
///
/// Every persisted row (usage events, plan limits, grants, provider settings)
/// is keyed by service so the product lines never bleed into each other's
/// quotas or presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    /// Long-form book writing studio.
    Books,
    /// Ad-copy generator.
    Ads,
    /// Quiz generator.
    Quiz,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Books => "books",
            Service::Ads => "ads",
            Service::Quiz => "quiz",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "books" => Ok(Service::Books),
            "ads" => Ok(Service::Ads),
            "quiz" => Ok(Service::Quiz),
            other => Err(anyhow!("unknown service: {other}")),
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
