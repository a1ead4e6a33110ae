use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::RwLock;

use quillgate_core::config::Config;
use quillgate_core::plan::{PlanLimits, PlanTier};
use quillgate_core::provider::{Phase, ProviderPair};
use quillgate_core::service::Service;
use quillgate_duckdb::DuckDbBackend;

use crate::engine::providers::ProviderRegistry;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// All fields are safe to clone cheaply — heavy resources are wrapped in
/// `Arc`.
pub struct AppState {
    /// The DuckDB backend. Internally uses `Arc<tokio::sync::Mutex<Connection>>`
    /// so it is already cheap to clone and async-safe.
    pub db: Arc<DuckDbBackend>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Provider clients keyed by provider name ("openai", "anthropic", ...).
    /// Swapped for stubs in executor tests.
    pub providers: ProviderRegistry,

    /// Short-TTL cache of resolved plan limits per (service, tier).
    ///
    /// Stores the post-fallback value, so a missing catalog row caches the
    /// hardcoded defaults too. Administrators tolerate up to one TTL of
    /// staleness across workers; the admin routes invalidate their own
    /// worker's entry on write for immediate read-back.
    limits_cache: Arc<RwLock<HashMap<(Service, PlanTier), (Instant, PlanLimits)>>>,

    /// Short-TTL cache of provider-settings lookups per (service, tier,
    /// phase). `None` (no row) is cached as well — absent settings are the
    /// common case and fall through to hardcoded defaults on every request.
    routing_cache: Arc<RwLock<HashMap<(Service, PlanTier, Phase), (Instant, Option<ProviderPair>)>>>,
}

impl AppState {
    /// Construct a new `AppState` wrapping the given backend and config,
    /// with provider clients built from the config's base URLs and keys.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let providers = ProviderRegistry::from_config(&config);
        Self::with_providers(db, config, providers)
    }

    /// Like [`AppState::new`] but with an explicit provider registry.
    /// Used by tests to inject stub providers.
    pub fn with_providers(db: DuckDbBackend, config: Config, providers: ProviderRegistry) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            providers,
            limits_cache: Arc::new(RwLock::new(HashMap::new())),
            routing_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.config.is_admin(user_id)
    }

    /// Effective plan limits for (service, tier): catalog row if present,
    /// hardcoded defaults otherwise, cached for the configured TTL.
    ///
    /// Errors propagate — the quota ledger turns them into a fail-closed
    /// `datastore-unavailable` denial rather than guessing at limits.
    pub async fn limits_for(&self, service: Service, tier: PlanTier) -> Result<PlanLimits> {
        let ttl = self.config.settings_cache_ttl();
        {
            let cache = self.limits_cache.read().await;
            if let Some((inserted, limits)) = cache.get(&(service, tier)) {
                if inserted.elapsed() < ttl {
                    return Ok(*limits);
                }
            }
        }

        let limits = match self.db.get_plan_limits(service, tier).await? {
            Some(record) => record.limits,
            None => PlanLimits::defaults(service, tier),
        };

        let mut cache = self.limits_cache.write().await;
        cache.insert((service, tier), (Instant::now(), limits));
        Ok(limits)
    }

    /// Provider-settings lookup for an (already alias-resolved) route key,
    /// cached for the configured TTL.
    pub async fn provider_setting_for(
        &self,
        service: Service,
        tier: PlanTier,
        phase: Phase,
    ) -> Result<Option<ProviderPair>> {
        let ttl = self.config.settings_cache_ttl();
        {
            let cache = self.routing_cache.read().await;
            if let Some((inserted, pair)) = cache.get(&(service, tier, phase)) {
                if inserted.elapsed() < ttl {
                    return Ok(pair.clone());
                }
            }
        }

        let pair = self.db.get_provider_setting(service, tier, phase).await?.map(|s| {
            ProviderPair {
                primary_provider: s.primary_provider,
                primary_model: s.primary_model,
                backup_provider: s.backup_provider,
                backup_model: s.backup_model,
            }
        });

        let mut cache = self.routing_cache.write().await;
        cache.insert((service, tier, phase), (Instant::now(), pair.clone()));
        Ok(pair)
    }

    /// Drop the cached limits for one catalog key after an admin write so
    /// this worker reads its own write back immediately.
    pub async fn invalidate_limits(&self, service: Service, tier: PlanTier) {
        self.limits_cache.write().await.remove(&(service, tier));
    }

    /// Drop the cached routing lookup for one key after an admin write.
    pub async fn invalidate_routing(&self, service: Service, tier: PlanTier, phase: Phase) {
        self.routing_cache
            .write()
            .await
            .remove(&(service, tier, phase));
    }
}
