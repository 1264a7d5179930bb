use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{info, warn};

use super::prompt::{SYSTEM_PROMPT, build_move_prompt};
use super::request::{MoveDecision, MoveRequest};
use super::wire::{ReplyParseError, parse_move_reply};
use crate::board::Position;
use crate::llm::{ChatMessage, CompletionParams};

/// Chat-completion capability the harness depends on.
pub trait LlmClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub params: CompletionParams,
    /// Upper bound on the inference call. Expiry counts as a transport failure.
    pub timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            params: CompletionParams::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// What came back from one inference attempt.
///
/// Only `Accepted` carries a move the model chose; every other variant is
/// resolved to the request's fallback position.
#[derive(Debug)]
pub enum InferenceOutcome {
    /// The reply named an empty cell.
    Accepted { position: Position, thinking: String },
    /// The reply parsed but named an unknown or occupied cell.
    Rejected { proposed: String, thinking: String },
    /// The reply text was not a usable JSON object.
    ParseFailed(ReplyParseError),
    /// The provider call failed or timed out.
    TransportFailed(anyhow::Error),
}

impl InferenceOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceOutcome::Accepted { .. } => "accepted",
            InferenceOutcome::Rejected { .. } => "rejected",
            InferenceOutcome::ParseFailed(_) => "parse_failed",
            InferenceOutcome::TransportFailed(_) => "transport_failed",
        }
    }

    /// Maps the outcome to a decision. The returned position is always empty
    /// on the request board.
    pub fn resolve(self, request: &MoveRequest) -> MoveDecision {
        let fallback = request.fallback();
        match self {
            InferenceOutcome::Accepted { position, thinking } if request.is_legal(position) => {
                MoveDecision { position, thinking }
            }
            InferenceOutcome::Accepted { position, thinking } => MoveDecision {
                position: fallback,
                thinking: with_note(
                    thinking,
                    &format!("(LLM chose invalid position '{position}', falling back to {fallback})"),
                ),
            },
            InferenceOutcome::Rejected { proposed, thinking } => MoveDecision {
                position: fallback,
                thinking: with_note(
                    thinking,
                    &format!("(LLM chose invalid position '{proposed}', falling back to {fallback})"),
                ),
            },
            InferenceOutcome::ParseFailed(err) => MoveDecision {
                position: fallback,
                thinking: format!("LLM reply could not be parsed: {err}. Falling back to {fallback}."),
            },
            InferenceOutcome::TransportFailed(err) => MoveDecision {
                position: fallback,
                thinking: format!("LLM error: {err:#}. Falling back to {fallback}."),
            },
        }
    }
}

fn with_note(thinking: String, note: &str) -> String {
    if thinking.trim().is_empty() {
        note.to_string()
    } else {
        format!("{thinking} {note}")
    }
}

/// Parses and validates raw model text against the request board.
pub fn classify_reply(raw: &str, request: &MoveRequest) -> InferenceOutcome {
    let reply = match parse_move_reply(raw) {
        Ok(reply) => reply,
        Err(err) => return InferenceOutcome::ParseFailed(err),
    };

    let proposed = reply.normalized_move();
    match Position::from_name(&proposed) {
        Some(position) if request.is_legal(position) => InferenceOutcome::Accepted {
            position,
            thinking: reply.thinking,
        },
        _ => InferenceOutcome::Rejected {
            proposed,
            thinking: reply.thinking,
        },
    }
}

/// The two-message exchange sent for a request.
pub fn build_messages(request: &MoveRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_move_prompt(
            request.board(),
            request.player(),
            request.instructions(),
        )),
    ]
}

/// Runs one inference attempt and classifies the result. Never fails.
pub async fn infer(
    request: &MoveRequest,
    llm: &dyn LlmClient,
    cfg: &HarnessConfig,
) -> InferenceOutcome {
    let messages = build_messages(request);
    match tokio::time::timeout(cfg.timeout, llm.complete(messages, cfg.params)).await {
        Ok(Ok(raw)) => classify_reply(&raw, request),
        Ok(Err(err)) => InferenceOutcome::TransportFailed(err),
        Err(_elapsed) => InferenceOutcome::TransportFailed(anyhow::anyhow!(
            "inference timed out after {}ms",
            cfg.timeout.as_millis()
        )),
    }
}

/// Decides a move for the request. Always returns a legal move.
pub async fn decide_move(
    request: &MoveRequest,
    llm: &dyn LlmClient,
    cfg: &HarnessConfig,
) -> MoveDecision {
    let outcome = infer(request, llm, cfg).await;
    match &outcome {
        InferenceOutcome::Accepted { position, .. } => {
            info!(player = %request.player(), position = %position, "move.accepted");
        }
        InferenceOutcome::Rejected { proposed, .. } => {
            warn!(reason = outcome.kind(), proposed = %proposed, fallback = %request.fallback(), "move.fallback");
        }
        InferenceOutcome::ParseFailed(err) => {
            warn!(reason = outcome.kind(), error = %err, fallback = %request.fallback(), "move.fallback");
        }
        InferenceOutcome::TransportFailed(err) => {
            let error = format!("{err:#}");
            warn!(reason = outcome.kind(), error = %error, fallback = %request.fallback(), "move.fallback");
        }
    }
    outcome.resolve(request)
}
