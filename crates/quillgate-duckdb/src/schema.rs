/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup (idempotent).
///
/// `memory_limit` is passed at runtime from `Config.duckdb_memory_limit`
/// (env `QUILLGATE_DUCKDB_MEMORY`, default `"1GB"`). Always set an explicit
/// limit — the DuckDB default (80% of system RAM) is not acceptable for a
/// server process. `SET threads = 2` bounds the background pool for
/// single-writer embedded use.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- SETTINGS
-- ===========================================
-- Keys stored in this table:
--   'version'     – Database schema version (for migrations)
--   'install_id'  – Unique installation identifier
CREATE TABLE IF NOT EXISTS settings (
    key             VARCHAR PRIMARY KEY,
    value           VARCHAR NOT NULL
);

-- ===========================================
-- PLAN LIMITS (catalog; administrator-owned)
-- ===========================================
-- Versioned: edits insert a new row with version + 1 and flip is_active,
-- they never mutate in place. The engine reads the active row with the
-- highest version; a missing key falls back to the hardcoded defaults in
-- quillgate-core.
CREATE TABLE IF NOT EXISTS plan_limits (
    service                   VARCHAR NOT NULL,
    plan_tier                 VARCHAR NOT NULL,
    version                   BIGINT  NOT NULL,
    content_creation_cap      BIGINT  NOT NULL,          -- -1 = unlimited
    text_daily_cap            BIGINT  NOT NULL,
    image_daily_cap           BIGINT  NOT NULL,
    total_daily_cap           BIGINT  NOT NULL,
    premium_credit_daily_cap  BIGINT  NOT NULL,
    standard_credit_daily_cap BIGINT  NOT NULL,
    ai_enabled                BOOLEAN NOT NULL DEFAULT TRUE,
    is_active                 BOOLEAN NOT NULL DEFAULT TRUE,
    updated_at                TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (service, plan_tier, version)
);
CREATE INDEX IF NOT EXISTS idx_plan_limits_key
    ON plan_limits(service, plan_tier, is_active);

-- ===========================================
-- PROMO GRANTS (promotion surface-owned)
-- ===========================================
-- Time-boxed entitlement overrides. Rows are never deleted on expiry; the
-- resolver filters by validity so history stays inspectable.
CREATE TABLE IF NOT EXISTS promo_grants (
    id              VARCHAR PRIMARY KEY,               -- 'grant_' + 10 hex chars
    user_id         VARCHAR NOT NULL,
    service         VARCHAR NOT NULL,
    granted_tier    VARCHAR NOT NULL,
    valid_from      TIMESTAMP NOT NULL,
    valid_until     TIMESTAMP NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_promo_grants_user
    ON promo_grants(user_id, service);

-- ===========================================
-- SUBSCRIPTIONS (billing surface-owned)
-- ===========================================
-- One row per (user, service); the billing webhook upserts on every state
-- change.
CREATE TABLE IF NOT EXISTS subscriptions (
    id                  VARCHAR NOT NULL,              -- 'sub_' + 10 hex chars
    user_id             VARCHAR NOT NULL,
    service             VARCHAR NOT NULL,
    plan_tier           VARCHAR NOT NULL,
    status              VARCHAR NOT NULL,              -- 'active' | 'trialing' | 'past_due' | 'canceled'
    current_period_end  TIMESTAMP NOT NULL,
    updated_at          TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (user_id, service)
);

-- ===========================================
-- PROVIDER MODEL SETTINGS (administrator-owned)
-- ===========================================
CREATE TABLE IF NOT EXISTS provider_model_settings (
    service          VARCHAR NOT NULL,
    plan_tier        VARCHAR NOT NULL,
    phase            VARCHAR NOT NULL,                 -- 'outline' | 'writing' | 'revision'
    primary_provider VARCHAR NOT NULL,
    primary_model    VARCHAR NOT NULL,
    backup_provider  VARCHAR NOT NULL,
    backup_model     VARCHAR NOT NULL,
    updated_at       TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (service, plan_tier, phase)
);

-- ===========================================
-- USAGE EVENTS (append-only; executor-owned)
-- ===========================================
-- The sole source of truth for usage. Never updated or deleted by the
-- engine; quota is recomputed by counting rows, never from a counter.
CREATE TABLE IF NOT EXISTS usage_events (
    id                VARCHAR NOT NULL,                -- UUID v4
    user_id           VARCHAR NOT NULL,
    service           VARCHAR NOT NULL,
    category          VARCHAR NOT NULL,                -- 'text' | 'image' | 'premium_credit' | 'standard_credit' | 'content_creation'
    provider          VARCHAR NOT NULL,
    model             VARCHAR NOT NULL,
    input_tokens      BIGINT  NOT NULL,
    output_tokens     BIGINT  NOT NULL,
    cost_minor_units  BIGINT  NOT NULL,
    created_at        TIMESTAMP NOT NULL
);

-- Primary query pattern: one user's windowed count per category.
CREATE INDEX IF NOT EXISTS idx_usage_user_window
    ON usage_events(user_id, service, category, created_at);
-- Reporting aggregation scans by time first.
CREATE INDEX IF NOT EXISTS idx_usage_created
    ON usage_events(created_at);
"#
    )
}
