//! JSON request and response models for the HTTP API.

use serde::{Deserialize, Serialize};

use tictactoe_agent_core::agent::MoveDecision;

/// Request body for `POST /api/move`.
///
/// Fields are loosely typed so validation can answer with a descriptive 400
/// instead of an extractor rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequestBody {
    /// Nine cells: "X", "O" or null.
    pub board: Vec<Option<String>>,
    pub player: String,
    #[serde(default)]
    pub instructions: String,
}

/// Response body for `POST /api/move`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResponse {
    #[serde(rename = "move")]
    pub move_index: usize,
    pub thinking: String,
    pub position: String,
}

impl From<MoveDecision> for MoveResponse {
    fn from(decision: MoveDecision) -> Self {
        Self {
            move_index: decision.index(),
            position: decision.position.name().to_string(),
            thinking: decision.thinking,
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
