//! Server configuration: `server.toml` plus environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use tictactoe_agent_core::agent::HarnessConfig;
use tictactoe_agent_core::llm::{
    ChatAuth, ChatCompletionConfig, CompletionParams, DEFAULT_API_VERSION, DEFAULT_TOKEN_RESOURCE,
};

use crate::config_loader::ConfigLoader;

pub const CONFIG_FILE: &str = "server.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpSection,
    #[serde(default)]
    pub llm: LlmSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HttpSection {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Directory holding the game UI. Served on every non-API path.
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            static_dir: default_static_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LlmSection {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// When unset, tokens come from the Azure CLI.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_token_resource")]
    pub token_resource: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_version: default_api_version(),
            api_key: None,
            token_resource: default_token_resource(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_static_dir() -> Option<PathBuf> {
    Some(PathBuf::from("docs"))
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_token_resource() -> String {
    DEFAULT_TOKEN_RESOURCE.to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl ServerConfig {
    /// Loads `server.toml` (defaults when absent) and applies process env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = ConfigLoader::parse_optional_file::<Self>(CONFIG_FILE)?.unwrap_or_default();
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Applies overrides from `lookup`. Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let get = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            self.llm.endpoint = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_DEPLOYMENT") {
            self.llm.deployment = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_API_VERSION") {
            self.llm.api_version = v;
        }
        if let Some(v) = get("TICTACTOE_LISTEN_ADDR") {
            self.server.listen = v;
        }
        if let Some(v) = get("TICTACTOE_STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TICTACTOE_LLM_TIMEOUT_MS") {
            self.llm.timeout_ms = v
                .trim()
                .parse()
                .with_context(|| format!("TICTACTOE_LLM_TIMEOUT_MS is not a number: {v}"))?;
        }
        Ok(())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm.timeout_ms)
    }

    /// Sampling parameters are fixed; only the timeout is configurable.
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            params: CompletionParams::default(),
            timeout: self.llm_timeout(),
        }
    }

    /// Provider settings. Endpoint and deployment are required.
    pub fn chat_completion_config(&self) -> anyhow::Result<ChatCompletionConfig> {
        let endpoint = self
            .llm
            .endpoint
            .clone()
            .context("llm endpoint not configured (set AZURE_OPENAI_ENDPOINT)")?;
        let deployment = self
            .llm
            .deployment
            .clone()
            .context("llm deployment not configured (set AZURE_OPENAI_DEPLOYMENT)")?;
        let auth = match &self.llm.api_key {
            Some(key) => ChatAuth::ApiKey(key.clone()),
            None => ChatAuth::AzureCli {
                resource: self.llm.token_resource.clone(),
            },
        };
        Ok(ChatCompletionConfig {
            endpoint,
            deployment,
            api_version: self.llm.api_version.clone(),
            auth,
            // A little slack so the harness timeout fires first.
            timeout: self.llm_timeout() + Duration::from_secs(1),
        })
    }
}
