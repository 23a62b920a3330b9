//! Binary entrypoint: load configuration, wire the LLM adapter, tool
//! registry, session store, and orchestrator, then serve the WebSocket
//! gateway.

use defi_chat_orchestrator::config::{LlmProvider, Settings};
use defi_chat_orchestrator::gateway::{build_router, GatewayState};
use defi_chat_orchestrator::llm::anthropic::AnthropicProvider;
use defi_chat_orchestrator::llm::openai::OpenAiProvider;
use defi_chat_orchestrator::llm::{Adapter, GenerateOptions, LlmProvider as LlmProviderTrait};
use defi_chat_orchestrator::orchestrator::Orchestrator;
use defi_chat_orchestrator::session::{spawn_reaper, SessionStore};
use defi_chat_orchestrator::telemetry::{init_tracing, Telemetry};
use defi_chat_orchestrator::tools::builtin::register_all;
use defi_chat_orchestrator::tools::ToolRegistry;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for decentralized finance (DeFi) \
users. You can check gas prices, crypto prices, lending rates, and token balances using the tools \
available to you. Be concise and precise about numbers.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    init_tracing(settings.log_level, settings.log_format);
    info!(port = settings.port, provider = ?settings.llm_provider, "starting defi-chat-orchestrator");

    let provider: Box<dyn LlmProviderTrait> = match settings.llm_provider {
        LlmProvider::OpenAi => Box::new(OpenAiProvider::new(settings.llm_api_key.clone())),
        LlmProvider::Anthropic => Box::new(AnthropicProvider::new(settings.llm_api_key.clone())),
    };

    let adapter = Arc::new(Adapter::new(
        provider,
        settings.circuit_failure_threshold,
        settings.circuit_reset_timeout,
        settings.llm_retry_delay,
        settings.llm_max_retries,
        settings.max_system_prompt_length,
    ));

    let mut registry = ToolRegistry::new();
    register_all(&mut registry);
    let tools = Arc::new(registry);

    let sessions = Arc::new(SessionStore::new(settings.max_history_length));

    let llm_options = GenerateOptions {
        system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        model: settings.llm_model.clone(),
        max_tokens: settings.llm_max_tokens,
        temperature: settings.llm_temperature,
        timeout: settings.llm_timeout,
    };

    let orchestrator = Arc::new(Orchestrator::new(
        adapter.clone(),
        tools,
        sessions.clone(),
        DEFAULT_SYSTEM_PROMPT.to_string(),
        settings.max_rounds,
        settings.tool_timeout,
        settings.request_timeout,
        llm_options,
    ));

    let telemetry = Arc::new(Telemetry::new(sessions.clone(), adapter));

    let shutdown = CancellationToken::new();
    let reaper = spawn_reaper(
        sessions.clone(),
        settings.cleanup_interval,
        chrono::Duration::from_std(settings.session_timeout).unwrap_or(chrono::Duration::minutes(30)),
        shutdown.clone(),
    );

    let state = GatewayState {
        orchestrator,
        telemetry,
        active_connections: Arc::new(AtomicUsize::new(0)),
        max_connections: settings.max_connections,
        ping_interval: settings.ping_interval,
        message_queue_size: settings.message_queue_size,
    };
    let router = build_router(state, &settings.cors_origin);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown.cancel();
    let _ = reaper.await;
    serve_result.map_err(Into::into)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
