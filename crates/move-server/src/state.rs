//! Shared application state for the axum server.

use std::path::PathBuf;
use std::sync::Arc;

use tictactoe_agent_core::agent::{HarnessConfig, LlmClient};

/// Read-only state handed to every handler. Requests share nothing mutable.
pub struct AppState {
    pub llm: Arc<dyn LlmClient>,
    pub harness: HarnessConfig,
    /// Game UI directory; `None` disables static hosting.
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(llm: Arc<dyn LlmClient>, harness: HarnessConfig) -> Arc<Self> {
        Arc::new(Self {
            llm,
            harness,
            static_dir: None,
        })
    }

    pub fn with_static_dir(
        llm: Arc<dyn LlmClient>,
        harness: HarnessConfig,
        static_dir: impl Into<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            llm,
            harness,
            static_dir: Some(static_dir.into()),
        })
    }
}
