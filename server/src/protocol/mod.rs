//! Wire types shared by the HTTP API and the WebSocket protocol

pub mod messages;

pub use messages::*;
