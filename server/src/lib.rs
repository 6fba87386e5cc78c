//! Science Explorer Server Library
//!
//! Persona chat sessions (Kid and Parent) backed by a hosted language model.
//! This module exports the server components for use in integration tests
//! and external tooling.

pub mod config;
pub mod inference;
pub mod persona;
pub mod protocol;
pub mod server;
pub mod session;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use inference::{InferenceBackend, InferenceError, OpenAiCompatibleBackend};
pub use persona::Mode;
pub use protocol::{ClientMessage, ServerMessage};
pub use server::{AppState, api_routes, ws_handler};
pub use session::{SessionError, SessionManager};
