use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a client names a mode that does not exist
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown mode '{0}' (expected 'kid' or 'parent')")]
pub struct InvalidModeError(pub String);

/// Active persona configuration for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Professor Atom, talking to the young scientist
    #[default]
    Kid,
    /// Dr. Morgan, talking to the supervising parent
    Parent,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Kid => "kid",
            Mode::Parent => "parent",
        }
    }

    pub fn all() -> &'static [Mode] {
        &[Mode::Kid, Mode::Parent]
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = InvalidModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kid" => Ok(Mode::Kid),
            "parent" => Ok(Mode::Parent),
            _ => Err(InvalidModeError(s.to_string())),
        }
    }
}
