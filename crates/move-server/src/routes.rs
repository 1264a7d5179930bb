//! Axum route handlers for the HTTP API.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{info, warn};

use tictactoe_agent_core::agent::{MoveRequest, decide_move};

use crate::models::{ErrorResponse, HealthResponse, MoveRequestBody, MoveResponse};
use crate::state::AppState;

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/move`: ask the model for a move.
///
/// # Errors
///
/// - 400 Bad Request: board length is not 9, unknown player marker, unknown
///   cell value, or no empty cells. The model is not called.
///
/// Inference failures never produce an error status: the fallback move is
/// returned with 200 and the failure is described in `thinking`.
pub async fn get_move(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MoveRequestBody>,
) -> Result<Json<MoveResponse>, (StatusCode, Json<ErrorResponse>)> {
    let request =
        MoveRequest::from_wire(&body.board, &body.player, body.instructions).map_err(|e| {
            warn!(error = %e, "move.rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    detail: e.to_string(),
                }),
            )
        })?;

    info!(
        player = %request.player(),
        empty = request.board().empty_positions().len(),
        "move.request"
    );
    let decision = decide_move(&request, state.llm.as_ref(), &state.harness).await;
    Ok(Json(MoveResponse::from(decision)))
}
