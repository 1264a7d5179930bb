use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::Mutex;

pub const DEFAULT_API_VERSION: &str = "2024-12-01-preview";
pub const DEFAULT_TOKEN_RESOURCE: &str = "https://cognitiveservices.azure.com";

/// Refresh cached tokens this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: u64 = 300;
/// Lifetime assumed when the CLI does not report an expiry.
const TOKEN_FALLBACK_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Decoding parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAuth {
    /// Static key sent in the `api-key` header.
    ApiKey(String),
    /// Bearer token from `az account get-access-token` for the given resource.
    AzureCli { resource: String },
}

/// Azure OpenAI deployment to call.
#[derive(Debug, Clone)]
pub struct ChatCompletionConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub auth: ChatAuth,
    /// Whole-request timeout applied by the HTTP client.
    pub timeout: Duration,
}

impl ChatCompletionConfig {
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_choice_text(res: ChatCompletionResponse) -> anyhow::Result<String> {
    res.choices
        .into_iter()
        .next()
        .context("completion has no choices")?
        .message
        .content
        .context("completion choice has no content")
}

#[derive(Deserialize)]
struct CliAccessToken {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(default)]
    expires_on: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Bearer tokens from the Azure CLI, cached until shortly before expiry.
#[derive(Debug)]
pub struct AzureCliCredential {
    program: String,
    resource: String,
    cached: Mutex<Option<CachedToken>>,
}

impl AzureCliCredential {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            program: "az".to_string(),
            resource: resource.into(),
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> anyhow::Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(tok) = cached.as_ref()
            && unix_now() < tok.refresh_at
        {
            return Ok(tok.token.clone());
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn fetch(&self) -> anyhow::Result<CachedToken> {
        // The harness timeout drops this future; the child must not outlive it.
        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--output", "json"])
            .arg("--resource")
            .arg(&self.resource)
            .kill_on_drop(true)
            .output()
            .await
            .context("failed to run az cli")?;
        if !output.status.success() {
            anyhow::bail!(
                "az account get-access-token failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let parsed: CliAccessToken =
            serde_json::from_slice(&output.stdout).context("az token decode failed")?;
        let refresh_at = match parsed.expires_on {
            Some(expires_on) => expires_on.saturating_sub(TOKEN_REFRESH_MARGIN_SECS),
            None => unix_now() + TOKEN_FALLBACK_TTL_SECS,
        };
        Ok(CachedToken {
            token: parsed.access_token,
            refresh_at,
        })
    }
}

/// Client for an Azure OpenAI chat-completions deployment.
#[derive(Debug)]
pub struct ChatCompletionClient {
    http: Client,
    cfg: ChatCompletionConfig,
    credential: Option<AzureCliCredential>,
}

impl ChatCompletionClient {
    pub fn new(cfg: ChatCompletionConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("failed to build http client")?;
        let credential = match &cfg.auth {
            ChatAuth::ApiKey(_) => None,
            ChatAuth::AzureCli { resource } => Some(AzureCliCredential::new(resource.clone())),
        };
        Ok(Self {
            http,
            cfg,
            credential,
        })
    }

    pub fn config(&self) -> &ChatCompletionConfig {
        &self.cfg
    }

    /// Sends the messages and returns the raw text of the first choice.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        params: CompletionParams,
    ) -> anyhow::Result<String> {
        let request = ChatCompletionRequest {
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let mut builder = self.http.post(self.cfg.completions_url()).json(&request);
        builder = match (&self.cfg.auth, &self.credential) {
            (ChatAuth::ApiKey(key), _) => builder.header("api-key", key),
            (ChatAuth::AzureCli { .. }, Some(credential)) => {
                builder.bearer_auth(credential.token().await?)
            }
            (ChatAuth::AzureCli { .. }, None) => anyhow::bail!("azure cli credential missing"),
        };

        let res = builder
            .send()
            .await
            .context("chat completion request failed")?
            .error_for_status()
            .context("chat completion non-2xx response")?
            .json::<ChatCompletionResponse>()
            .await
            .context("chat completion response decode failed")?;

        first_choice_text(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(endpoint: &str) -> ChatCompletionConfig {
        ChatCompletionConfig {
            endpoint: endpoint.to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            auth: ChatAuth::ApiKey("k".to_string()),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn completions_url_joins_parts() {
        let expected = "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-12-01-preview";
        assert_eq!(cfg("https://res.openai.azure.com").completions_url(), expected);
        assert_eq!(cfg("https://res.openai.azure.com/").completions_url(), expected);
    }

    #[test]
    fn request_body_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let body = serde_json::to_value(ChatCompletionRequest {
            messages: &messages,
            temperature: 0.5,
            max_tokens: 200,
        })
        .unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["max_tokens"], 200);
    }

    #[test]
    fn first_choice_text_extracts_content() {
        let res: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"{\"move\":\"center\"}"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_text(res).unwrap(), "{\"move\":\"center\"}");
    }

    #[test]
    fn first_choice_text_rejects_empty_responses() {
        let res: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_choice_text(res).is_err());

        let res: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        let err = first_choice_text(res).unwrap_err();
        assert!(format!("{err}").contains("no content"));
    }

    #[test]
    fn cli_token_decodes_expiry() {
        let tok: CliAccessToken = serde_json::from_str(
            r#"{"accessToken":"abc","expiresOn":"2026-01-01 00:00:00.000000","expires_on":1767225600,"tokenType":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(tok.access_token, "abc");
        assert_eq!(tok.expires_on, Some(1_767_225_600));
    }

    #[tokio::test]
    async fn credential_serves_cached_token() {
        let credential = AzureCliCredential::new(DEFAULT_TOKEN_RESOURCE);
        *credential.cached.lock().await = Some(CachedToken {
            token: "cached".to_string(),
            refresh_at: unix_now() + 60,
        });
        assert_eq!(credential.token().await.unwrap(), "cached");
    }

    #[cfg(target_os = "linux")]
    fn process_is_gone(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            // Field 3 is the state; a zombie has already been killed.
            Ok(stat) => stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
            Err(_) => true,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timed_out_token_fetch_kills_cli() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("tictactoe-az-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let pid_file = dir.join("pid");
        let script = dir.join("az");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho $$ > '{}'\nexec sleep 30\n", pid_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut credential = AzureCliCredential::new(DEFAULT_TOKEN_RESOURCE);
        credential.program = script.display().to_string();
        let res = tokio::time::timeout(Duration::from_millis(500), credential.token()).await;
        assert!(res.is_err(), "hung cli should hit the timeout");

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        let mut gone = false;
        for _ in 0..40 {
            if process_is_gone(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let _ = std::fs::remove_dir_all(&dir);
        assert!(gone, "az child {pid} still running after timeout");
    }

    mod provider {
        use std::collections::HashMap;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::{Arc, Mutex as StdMutex};

        use axum::extract::{Json, Query, State};
        use axum::http::{HeaderMap, StatusCode};
        use axum::response::{IntoResponse, Response};
        use axum::routing::post;
        use axum::Router;
        use serde_json::{Value, json};

        use super::*;

        #[derive(Debug, Clone)]
        struct SeenRequest {
            api_key: Option<String>,
            authorization: Option<String>,
            api_version: Option<String>,
            body: Value,
        }

        #[derive(Clone, Default)]
        struct FakeProvider {
            seen: Arc<StdMutex<Vec<SeenRequest>>>,
            reject_next: Arc<AtomicBool>,
        }

        async fn chat_completions(
            State(provider): State<FakeProvider>,
            Query(query): Query<HashMap<String, String>>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> Response {
            let header = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            provider.seen.lock().unwrap().push(SeenRequest {
                api_key: header("api-key"),
                authorization: header("authorization"),
                api_version: query.get("api-version").cloned(),
                body,
            });
            if provider.reject_next.swap(false, Ordering::SeqCst) {
                return (StatusCode::UNAUTHORIZED, "invalid key").into_response();
            }
            Json(json!({
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "{\"move\":\"center\"}"}},
                    {"index": 1, "message": {"role": "assistant", "content": "{\"move\":\"top-left\"}"}}
                ]
            }))
            .into_response()
        }

        async fn serve(provider: FakeProvider) -> String {
            let app = Router::new()
                .route(
                    "/openai/deployments/gpt-4o/chat/completions",
                    post(chat_completions),
                )
                .with_state(provider);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}")
        }

        fn messages() -> Vec<ChatMessage> {
            vec![ChatMessage::system("sys"), ChatMessage::user("your move")]
        }

        #[tokio::test]
        async fn complete_posts_with_api_key() {
            let provider = FakeProvider::default();
            provider.reject_next.store(true, Ordering::SeqCst);
            let endpoint = serve(provider.clone()).await;
            let client = ChatCompletionClient::new(cfg(&endpoint)).unwrap();

            let err = client
                .complete(&messages(), CompletionParams::default())
                .await
                .unwrap_err();
            assert!(format!("{err}").contains("non-2xx"));

            let text = client
                .complete(&messages(), CompletionParams::default())
                .await
                .unwrap();
            assert_eq!(text, "{\"move\":\"center\"}");

            let seen = provider.seen.lock().unwrap().clone();
            assert_eq!(seen.len(), 2);
            let req = &seen[1];
            assert_eq!(req.api_key.as_deref(), Some("k"));
            assert_eq!(req.authorization, None);
            assert_eq!(req.api_version.as_deref(), Some(DEFAULT_API_VERSION));
            assert_eq!(req.body["messages"][0]["role"], "system");
            assert_eq!(req.body["messages"][1]["content"], "your move");
            assert_eq!(req.body["max_tokens"], 200);
            assert_eq!(req.body["temperature"].as_f64().map(|t| t as f32), Some(0.7));
        }

        #[tokio::test]
        async fn complete_sends_cli_bearer_token() {
            let provider = FakeProvider::default();
            let endpoint = serve(provider.clone()).await;
            let mut chat = cfg(&endpoint);
            chat.auth = ChatAuth::AzureCli {
                resource: DEFAULT_TOKEN_RESOURCE.to_string(),
            };
            let client = ChatCompletionClient::new(chat).unwrap();
            let credential = client.credential.as_ref().unwrap();
            *credential.cached.lock().await = Some(CachedToken {
                token: "cached".to_string(),
                refresh_at: unix_now() + 60,
            });

            let text = client
                .complete(&messages(), CompletionParams::default())
                .await
                .unwrap();
            assert_eq!(text, "{\"move\":\"center\"}");

            let seen = provider.seen.lock().unwrap().clone();
            assert_eq!(seen[0].authorization.as_deref(), Some("Bearer cached"));
            assert_eq!(seen[0].api_key, None);
        }

        #[tokio::test]
        async fn complete_rejects_unknown_deployment() {
            let endpoint = serve(FakeProvider::default()).await;
            let mut chat = cfg(&endpoint);
            chat.deployment = "missing".to_string();
            let client = ChatCompletionClient::new(chat).unwrap();
            let err = client
                .complete(&messages(), CompletionParams::default())
                .await
                .unwrap_err();
            assert!(format!("{err}").contains("non-2xx"));
        }
    }

    #[test]
    fn client_keeps_config() {
        let client = ChatCompletionClient::new(cfg("https://res.openai.azure.com")).unwrap();
        assert_eq!(client.config().deployment, "gpt-4o");
        assert!(client.credential.is_none());
    }
}
