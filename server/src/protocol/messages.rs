use crate::persona::Mode;
use serde::{Deserialize, Serialize};

/// Client to Server messages (WebSocket)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start a chat session bound to this connection
    StartSession {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
        seq: u64,
    },
    /// Send a user turn
    Submit { text: String, seq: u64 },
    /// Switch persona (clears the conversation)
    SetMode { mode: String, seq: u64 },
    /// Start over in the current mode
    Reset { seq: u64 },
    /// Ping for keepalive
    Ping { seq: u64 },
}

/// Server to Client messages (WebSocket)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Session was created for this connection
    SessionStarted { session: SessionSnapshot },
    /// A user turn was accepted and the reply is being generated
    Pending {
        seq: u64,
        turn: Turn,
        label: String,
    },
    /// Assistant reply for a submit
    AssistantTurn { seq: u64, turn: Turn },
    /// Mode switched; the conversation starts fresh
    ModeChanged { session: SessionSnapshot },
    /// Conversation cleared, mode kept
    SessionReset { session: SessionSnapshot },
    /// Acknowledgment of client action
    Ack {
        ack_seq: u64,
        status: AckStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// User-visible error; the session stays usable
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
        code: ErrorCode,
        message: String,
    },
    /// Pong response (to client's Ping)
    Pong,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Ok,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    SessionNotFound,
    InvalidMode,
    InferenceFailed,
    Busy,
    EmptyMessage,
    TooManySessions,
    Superseded,
    InvalidMessage,
    NoSession,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SessionNotFound => "session_not_found",
            ErrorCode::InvalidMode => "invalid_mode",
            ErrorCode::InferenceFailed => "inference_failed",
            ErrorCode::Busy => "busy",
            ErrorCode::EmptyMessage => "empty_message",
            ErrorCode::TooManySessions => "too_many_sessions",
            ErrorCode::Superseded => "superseded",
            ErrorCode::InvalidMessage => "invalid_message",
            ErrorCode::NoSession => "no_session",
        }
    }
}

/// Who produced a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

impl Turn {
    pub fn user(content: impl Into<String>, created_at: u64) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at,
        }
    }

    pub fn assistant(content: impl Into<String>, created_at: u64) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at,
        }
    }
}

/// Session snapshot for rendering the chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub mode: Mode,
    pub persona_name: String,
    pub title: String,
    pub welcome_message: String,
    pub input_placeholder: String,
    pub pending_label: String,
    /// A submit is awaiting its reply
    pub pending: bool,
    pub history: Vec<Turn>,
    pub suggestions: Vec<String>,
    pub sidebar: SidebarSnapshot,
}

/// Side panel copy for the active mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidebarSnapshot {
    pub heading: String,
    pub intro: String,
    pub guide_title: String,
    pub guide_items: Vec<String>,
    pub footer: String,
}

/// POST /api/sessions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// POST /api/sessions/:id/messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub turn: Turn,
    pub session: SessionSnapshot,
}

/// PUT /api/sessions/:id/mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetModeRequest {
    pub mode: String,
}

/// GET /api/suggestions/:mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub mode: Mode,
    pub suggestions: Vec<String>,
}

/// Error body for the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ClientMessage {
    /// Get the message type name for metrics
    pub fn message_type(&self) -> &'static str {
        match self {
            ClientMessage::StartSession { .. } => "start_session",
            ClientMessage::Submit { .. } => "submit",
            ClientMessage::SetMode { .. } => "set_mode",
            ClientMessage::Reset { .. } => "reset",
            ClientMessage::Ping { .. } => "ping",
        }
    }
}

impl ServerMessage {
    /// Get the message type name for metrics
    pub fn message_type(&self) -> &'static str {
        match self {
            ServerMessage::SessionStarted { .. } => "session_started",
            ServerMessage::Pending { .. } => "pending",
            ServerMessage::AssistantTurn { .. } => "assistant_turn",
            ServerMessage::ModeChanged { .. } => "mode_changed",
            ServerMessage::SessionReset { .. } => "session_reset",
            ServerMessage::Ack { .. } => "ack",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Pong => "pong",
        }
    }
}
