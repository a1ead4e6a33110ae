//! The fallback-aware generation executor.
//!
//! Per-call state machine:
//! `NotStarted → PrimaryInFlight → {Success | PrimaryFailed}` and
//! `PrimaryFailed → BackupInFlight → {Success | BothFailed}`. No state is
//! re-entered: the backup is attempted exactly once, and a second failure is
//! treated as systemic rather than transient — no further retries.

use std::sync::Arc;

use tracing::{error, info, warn};

use quillgate_core::error::GovernanceError;
use quillgate_core::generation::{repair_json, GenerationRequest, GenerationResult, TokenUsage};
use quillgate_core::provider::ProviderPair;
use quillgate_core::quota::UsageCategory;
use quillgate_core::service::Service;
use quillgate_core::usage::{estimate_tokens, UsageEvent, UsageStore};

use crate::engine::providers::{ProviderCallError, ProviderRegistry, ProviderResponse};
use crate::state::AppState;

/// Who the finished call is charged to.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub user_id: String,
    pub service: Service,
    pub category: UsageCategory,
}

/// Run one generation against the resolved route.
///
/// The whole call — both legs and the usage append — runs on a spawned task
/// and the handler merely awaits its handle. A caller disconnect therefore
/// aborts nothing: the in-flight leg runs to completion and is logged, and
/// the policy is symmetric across primary and backup by construction, so
/// cost attribution stays honest.
pub async fn execute(
    state: &AppState,
    ctx: ExecutionContext,
    pair: ProviderPair,
    request: GenerationRequest,
) -> Result<GenerationResult, GovernanceError> {
    let providers = state.providers.clone();
    let store: Arc<dyn UsageStore> = state.db.clone();

    let handle = tokio::spawn(async move { run(providers, store, ctx, pair, request).await });

    match handle.await {
        Ok(result) => result,
        // JoinError means the task panicked; surface it as unavailability
        // rather than poisoning the worker.
        Err(e) => Err(GovernanceError::GenerationUnavailable {
            primary: format!("executor task failed: {e}"),
            backup: "not attempted".to_string(),
        }),
    }
}

async fn run(
    providers: ProviderRegistry,
    store: Arc<dyn UsageStore>,
    ctx: ExecutionContext,
    pair: ProviderPair,
    request: GenerationRequest,
) -> Result<GenerationResult, GovernanceError> {
    // PrimaryInFlight
    let primary_error =
        match attempt(&providers, &pair.primary_provider, &pair.primary_model, &request).await {
            Ok(response) => {
                return Ok(finish(
                    store,
                    ctx,
                    &pair.primary_provider,
                    &pair.primary_model,
                    &request,
                    response,
                ));
            }
            Err(e) => e,
        };

    warn!(
        provider = %pair.primary_provider, model = %pair.primary_model,
        error = %primary_error,
        "primary provider failed — trying backup"
    );

    // BackupInFlight — identical payload, exactly one attempt.
    match attempt(&providers, &pair.backup_provider, &pair.backup_model, &request).await {
        Ok(response) => Ok(finish(
            store,
            ctx,
            &pair.backup_provider,
            &pair.backup_model,
            &request,
            response,
        )),
        Err(backup_error) => Err(GovernanceError::GenerationUnavailable {
            primary: primary_error.to_string(),
            backup: backup_error.to_string(),
        }),
    }
}

/// One leg: provider call plus, in json mode, output validation with a
/// single local repair attempt. Any failure here makes the leg fail — the
/// caller decides what happens next.
async fn attempt(
    providers: &ProviderRegistry,
    provider_name: &str,
    model: &str,
    request: &GenerationRequest,
) -> Result<ProviderResponse, ProviderCallError> {
    let provider = providers
        .get(provider_name)
        .ok_or_else(|| ProviderCallError::UnknownProvider(provider_name.to_string()))?;

    let mut response = provider.generate(model, request).await?;

    if request.json_mode {
        match repair_json(&response.content) {
            Some(valid) => response.content = valid,
            None => {
                return Err(ProviderCallError::Malformed(
                    "structured output unparsable after repair".to_string(),
                ))
            }
        }
    }

    Ok(response)
}

/// Success path for either leg: build the result and trigger exactly one
/// usage-event append for the provider/model that actually served.
///
/// The append is fire-and-forget — it never adds to user-visible latency,
/// it still runs after a caller disconnect, and its failure is logged and
/// swallowed (usage undercounts rather than the request failing).
fn finish(
    store: Arc<dyn UsageStore>,
    ctx: ExecutionContext,
    provider: &str,
    model: &str,
    request: &GenerationRequest,
    response: ProviderResponse,
) -> GenerationResult {
    let usage = response.usage.unwrap_or_else(|| TokenUsage {
        input_tokens: request
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum(),
        output_tokens: estimate_tokens(&response.content),
    });

    let event = UsageEvent::new(
        &ctx.user_id,
        ctx.service,
        ctx.category,
        provider,
        model,
        usage.input_tokens,
        usage.output_tokens,
    );

    info!(
        user_id = %ctx.user_id, service = %ctx.service, category = %ctx.category,
        provider, model,
        input_tokens = usage.input_tokens, output_tokens = usage.output_tokens,
        "generation served"
    );

    tokio::spawn(async move {
        if let Err(e) = store.append_usage(&event).await {
            error!(
                error = %e, event_id = %event.id, user_id = %event.user_id,
                "usage-event append failed — usage undercounted"
            );
        }
    });

    GenerationResult {
        content: response.content,
        model_used: model.to_string(),
        provider_used: provider.to_string(),
        usage,
    }
}
