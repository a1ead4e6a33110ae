use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use quillgate_server::state::AppState;

/// `quillgate health` — liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$QUILLGATE_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("QUILLGATE_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Health-check subcommand — handled before tokio does any real work so
    // the binary stays cheap as a Docker HEALTHCHECK probe.
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }
    // Initialise structured JSON logging. Level controlled via RUST_LOG env var.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quillgate=info".parse()?),
        )
        .json()
        .init();

    let cfg = quillgate_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Ensure data directory exists before opening DuckDB.
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/quillgate.db", cfg.data_dir);

    // Open DuckDB — initialises schema and seeds the settings table.
    let db = quillgate_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    if cfg.admin_users.is_empty() {
        info!("No administrator allow-list configured (QUILLGATE_ADMIN_USERS empty) — admin routes locked");
    } else {
        info!(count = cfg.admin_users.len(), "Administrator allow-list loaded");
    }
    if cfg.openai_api_key.is_none() && cfg.anthropic_api_key.is_none() {
        tracing::warn!(
            "No provider API keys configured. Generation will fail both legs; \
             set QUILLGATE_OPENAI_API_KEY / QUILLGATE_ANTHROPIC_API_KEY."
        );
    }

    let state = Arc::new(AppState::new(db, cfg.clone()));

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = quillgate_server::app::build_app(Arc::clone(&state));

    info!(
        port = cfg.port,
        quota_utc_offset_minutes = cfg.quota_utc_offset_minutes,
        "Quillgate listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    // Give in-flight fire-and-forget usage appends a moment to land before
    // the process exits; their tasks run on this runtime.
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;

    Ok(())
}
