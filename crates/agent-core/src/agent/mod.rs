//! Move-decision pipeline: prompt encoding, reply parsing and the harness that
//! turns one inference attempt into a legal move.
//!
//! The contract is locked down here: the model must answer with a JSON object
//! `{"thinking": "...", "move": "<position name>"}`, and anything else resolves
//! to the lowest-indexed empty cell.

pub mod harness;
pub mod prompt;
pub mod request;
pub mod wire;

pub use harness::{
    HarnessConfig, InferenceOutcome, LlmClient, classify_reply, decide_move, infer,
};
pub use request::{MoveDecision, MoveRequest, RequestError};
pub use wire::{MoveReplyWire, ReplyParseError, parse_move_reply, strip_code_fence};
