//! Persona configuration
//!
//! This module provides:
//! - `Mode` for the kid/parent persona toggle
//! - `instructions_for` returning the static directive list of a mode
//! - `profile_for` / `suggestions_for` for per-mode UI copy and quick prompts

mod instructions;
mod mode;
mod profile;

pub use instructions::{AGENT_DESCRIPTION, InstructionSet, MARKDOWN_DIRECTIVE, instructions_for};
pub use mode::{InvalidModeError, Mode};
pub use profile::{PersonaProfile, SidebarCopy, profile_for, suggestions_for};
