use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use tictactoe_agent_core::agent::LlmClient;
use tictactoe_agent_core::llm::{ChatCompletionClient, ChatMessage, CompletionParams};
use tictactoe_move_server::build_app;
use tictactoe_move_server::config::ServerConfig;
use tictactoe_move_server::state::AppState;

struct RunnerLlm {
    client: ChatCompletionClient,
}

impl LlmClient for RunnerLlm {
    fn complete<'a>(
        &'a self,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move { self.client.complete(&messages, params).await })
    }
}

fn build_state(cfg: &ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let client = ChatCompletionClient::new(cfg.chat_completion_config()?)?;
    let llm: Arc<dyn LlmClient> = Arc::new(RunnerLlm { client });
    let harness = cfg.harness_config();
    Ok(match &cfg.server.static_dir {
        Some(dir) if dir.is_dir() => AppState::with_static_dir(llm, harness, dir),
        Some(dir) => {
            tracing::warn!(dir = %dir.display(), "server.static_dir_missing");
            AppState::new(llm, harness)
        }
        None => AppState::new(llm, harness),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ServerConfig::load()?;
    let state = build_state(&cfg)?;
    tracing::info!(
        deployment = cfg.llm.deployment.as_deref().unwrap_or_default(),
        timeout_ms = cfg.llm.timeout_ms,
        "server.configured"
    );

    let listener = tokio::net::TcpListener::bind(&cfg.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.listen))?;
    tracing::info!(addr = %cfg.server.listen, "server.listening");

    axum::serve(listener, build_app(state))
        .await
        .context("server error")
}
