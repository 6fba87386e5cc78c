//! Per-session inference collaborator
//!
//! An [`Agent`] pairs the shared backend with the instruction set of the
//! session's current mode and the exchanges the model has already seen.
//! Mode switches and resets go through [`Agent::rebuild`], which replaces
//! both in a single `&mut self` call.

use std::sync::Arc;

use super::backend::{InferenceBackend, InferenceError, InferenceRequest};
use crate::persona::InstructionSet;
use crate::protocol::Turn;

pub struct Agent {
    backend: Arc<dyn InferenceBackend>,
    instructions: InstructionSet,
    memory: Vec<Turn>,
}

impl Agent {
    pub fn new(backend: Arc<dyn InferenceBackend>, instructions: InstructionSet) -> Self {
        Self {
            backend,
            instructions,
            memory: Vec::new(),
        }
    }

    pub fn instructions(&self) -> &InstructionSet {
        &self.instructions
    }

    /// Exchanges the model will be shown on the next call
    pub fn memory(&self) -> &[Turn] {
        &self.memory
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Swap in new instructions and forget everything remembered so far
    pub fn rebuild(&mut self, instructions: InstructionSet) {
        self.instructions = instructions;
        self.memory.clear();
    }

    /// Record a completed exchange so later calls carry it as context
    pub fn remember(&mut self, user: Turn, assistant: Turn) {
        self.memory.push(user);
        self.memory.push(assistant);
    }

    /// Detach the data one call needs, so the caller can drop its lock
    /// before awaiting the backend.
    pub fn prepare(&self, input: &str) -> PreparedCall {
        PreparedCall {
            backend: Arc::clone(&self.backend),
            instructions: self.instructions,
            prior_turns: self.memory.clone(),
            input: input.to_string(),
        }
    }
}

/// A single backend call, owned and independent of the session lock
pub struct PreparedCall {
    backend: Arc<dyn InferenceBackend>,
    instructions: InstructionSet,
    prior_turns: Vec<Turn>,
    input: String,
}

impl PreparedCall {
    pub fn instructions(&self) -> &InstructionSet {
        &self.instructions
    }

    pub async fn invoke(&self) -> Result<String, InferenceError> {
        self.backend
            .invoke(InferenceRequest {
                instructions: &self.instructions,
                prior_turns: &self.prior_turns,
                input: &self.input,
            })
            .await
    }
}
