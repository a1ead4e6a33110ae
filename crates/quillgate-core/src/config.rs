use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub duckdb_memory_limit: String,
    /// Administrator allow-list: caller identities granted the synthetic
    /// unlimited tier and access to the admin surface. Static config, never
    /// persisted.
    pub admin_users: Vec<String>,
    /// Day-window boundary offset from UTC midnight, in minutes. Applied
    /// uniformly to every windowed quota count.
    pub quota_utc_offset_minutes: i32,
    /// TTL for the per-process plan-limits and provider-settings caches.
    /// Administrators do not need instant cross-worker read-after-write.
    pub settings_cache_ttl_secs: u64,
    pub cors_origins: Vec<String>,
    pub provider_timeout_secs: u64,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("QUILLGATE_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("QUILLGATE_DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("QUILLGATE_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            admin_users: std::env::var("QUILLGATE_ADMIN_USERS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            quota_utc_offset_minutes: std::env::var("QUILLGATE_QUOTA_UTC_OFFSET_MINUTES")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .map_err(|e| format!("invalid quota offset: {e}"))?,
            settings_cache_ttl_secs: std::env::var("QUILLGATE_SETTINGS_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            cors_origins: std::env::var("QUILLGATE_CORS_ORIGINS")
                .map(|v| v.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            provider_timeout_secs: std::env::var("QUILLGATE_PROVIDER_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            openai_api_key: std::env::var("QUILLGATE_OPENAI_API_KEY").ok(),
            openai_base_url: std::env::var("QUILLGATE_OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            anthropic_api_key: std::env::var("QUILLGATE_ANTHROPIC_API_KEY").ok(),
            anthropic_base_url: std::env::var("QUILLGATE_ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string()),
        })
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_users.iter().any(|u| u == user_id)
    }

    pub fn settings_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.settings_cache_ttl_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}
