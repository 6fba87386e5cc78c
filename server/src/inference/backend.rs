//! InferenceBackend trait definition

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::persona::InstructionSet;
use crate::protocol::Turn;

/// Errors from the remote model call
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("Inference request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Inference transport error: {0}")]
    Transport(String),

    #[error("Inference API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid inference response: {0}")]
    InvalidResponse(String),

    #[error("Inference backend not configured: {0}")]
    NotConfigured(String),
}

/// Everything the model sees for one turn
#[derive(Debug, Clone, Copy)]
pub struct InferenceRequest<'a> {
    pub instructions: &'a InstructionSet,
    /// Completed exchanges, oldest first
    pub prior_turns: &'a [Turn],
    pub input: &'a str,
}

/// Trait for inference collaborators (hosted API, local server, test doubles)
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Short name for logs and metrics labels
    fn name(&self) -> &'static str;

    /// Produce the assistant reply for `request.input`
    async fn invoke(&self, request: InferenceRequest<'_>) -> Result<String, InferenceError>;
}
