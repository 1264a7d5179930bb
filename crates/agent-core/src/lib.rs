//! Core of the tic-tac-toe agent: board model, prompt building, the LLM client
//! and the validator that guarantees every answer is a legal move.
//!
//! Kept free of any HTTP server concerns so the move server and ad-hoc tools
//! can share the same pipeline.

pub mod agent;
pub mod board;
pub mod llm;
