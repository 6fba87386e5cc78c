//! Inference collaborator
//!
//! This module provides:
//! - `InferenceBackend` trait for abstracting the model provider
//! - `Agent`, the per-session handle holding instructions and model memory
//! - `OpenAiCompatibleBackend` for hosted OpenAI-compatible APIs

mod agent;
mod backend;
mod openai;

pub use agent::{Agent, PreparedCall};
pub use backend::{InferenceBackend, InferenceError, InferenceRequest};
pub use openai::OpenAiCompatibleBackend;
