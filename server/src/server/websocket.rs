use super::AppState;
use crate::persona::{Mode, profile_for};
use crate::protocol::{AckStatus, ClientMessage, ErrorCode, ServerMessage};
use crate::session::SessionError;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Connection state for a single client
pub struct Connection {
    /// Chat session owned by this connection, once started
    pub session_id: Option<String>,
    pub last_seen: Instant,
}

/// Global connection registry
pub type ConnectionRegistry = Arc<RwLock<HashMap<Uuid, Connection>>>;

/// Configuration for WebSocket connections
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// How often idle connections are checked
    pub check_interval: Duration,
    /// Close the connection after this long without any client frame
    pub idle_timeout: Duration,
    pub max_message_size: usize,
    pub outgoing_buffer: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(120),
            max_message_size: 64 * 1024, // 64KB
            outgoing_buffer: 32,
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.ws_config.max_message_size)
        .on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!("New WebSocket connection: {}", connection_id);
    counter!("science_explorer_ws_connections_total").increment(1);

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.ws_config.outgoing_buffer);

    // Register connection
    {
        let mut connections = state.connections.write().await;
        connections.insert(
            connection_id,
            Connection {
                session_id: None,
                last_seen: Instant::now(),
            },
        );
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Forward outgoing messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    counter!(
                        "science_explorer_ws_messages_sent_total",
                        "type" => msg.message_type()
                    )
                    .increment(1);
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
    });

    // Resolves once the client has been silent for too long
    let mut idle_watch = tokio::spawn(watch_idle(state.clone(), connection_id));

    loop {
        let next = tokio::select! {
            _ = &mut idle_watch => {
                info!("Connection {} idle, closing", connection_id);
                break;
            }
            next = ws_receiver.next() => next,
        };

        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                error!("WebSocket error for {}: {}", connection_id, e);
                break;
            }
            None => break,
        };

        match msg {
            Message::Text(text) => {
                mark_seen(&state, connection_id).await;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        handle_client_message(client_msg, connection_id, &state, &tx).await;
                    }
                    Err(e) => {
                        warn!("Failed to parse client message: {}", e);
                        let _ = tx
                            .send(ServerMessage::Error {
                                seq: None,
                                code: ErrorCode::InvalidMessage,
                                message: format!("Invalid message format: {}", e),
                            })
                            .await;
                    }
                }
            }
            Message::Binary(_) => {
                debug!("Ignoring binary message from {}", connection_id);
            }
            Message::Ping(_) | Message::Pong(_) => {
                // axum answers pings itself
                mark_seen(&state, connection_id).await;
            }
            Message::Close(_) => {
                info!("Client {} requested close", connection_id);
                break;
            }
        }
    }

    // Cleanup
    idle_watch.abort();
    send_task.abort();

    let connection = state.connections.write().await.remove(&connection_id);

    // The session lives only as long as its connection
    if let Some(Connection {
        session_id: Some(session_id),
        ..
    }) = connection
        && let Err(e) = state.session_manager.end_session(&session_id).await
    {
        debug!("Session {} already gone on close: {}", session_id, e);
    }

    info!("WebSocket connection closed: {}", connection_id);
}

async fn watch_idle(state: AppState, connection_id: Uuid) {
    let mut interval = tokio::time::interval(state.ws_config.check_interval);
    loop {
        interval.tick().await;
        let idle = {
            let connections = state.connections.read().await;
            match connections.get(&connection_id) {
                Some(conn) => conn.last_seen.elapsed() > state.ws_config.idle_timeout,
                None => true,
            }
        };
        if idle {
            return;
        }
    }
}

async fn mark_seen(state: &AppState, connection_id: Uuid) {
    let mut connections = state.connections.write().await;
    if let Some(conn) = connections.get_mut(&connection_id) {
        conn.last_seen = Instant::now();
    }
}

async fn bound_session(state: &AppState, connection_id: Uuid) -> Option<String> {
    state
        .connections
        .read()
        .await
        .get(&connection_id)
        .and_then(|conn| conn.session_id.clone())
}

async fn ack(tx: &mpsc::Sender<ServerMessage>, seq: u64) {
    let _ = tx
        .send(ServerMessage::Ack {
            ack_seq: seq,
            status: AckStatus::Ok,
            reason: None,
        })
        .await;
}

/// Report a failed request: an error the UI can show, then a rejected ack
async fn reject(tx: &mpsc::Sender<ServerMessage>, seq: u64, code: ErrorCode, message: String) {
    let _ = tx
        .send(ServerMessage::Error {
            seq: Some(seq),
            code,
            message: message.clone(),
        })
        .await;
    let _ = tx
        .send(ServerMessage::Ack {
            ack_seq: seq,
            status: AckStatus::Rejected,
            reason: Some(message),
        })
        .await;
}

async fn reject_session_error(tx: &mpsc::Sender<ServerMessage>, seq: u64, error: SessionError) {
    reject(tx, seq, error.code(), error.user_message()).await;
}

/// Handle a parsed client message
async fn handle_client_message(
    msg: ClientMessage,
    connection_id: Uuid,
    state: &AppState,
    tx: &mpsc::Sender<ServerMessage>,
) {
    counter!(
        "science_explorer_ws_messages_received_total",
        "type" => msg.message_type()
    )
    .increment(1);

    match msg {
        ClientMessage::Ping { seq } => {
            let _ = tx.send(ServerMessage::Pong).await;
            ack(tx, seq).await;
        }
        ClientMessage::StartSession { mode, seq } => {
            start_session(mode, seq, connection_id, state, tx).await;
        }
        ClientMessage::Submit { text, seq } => {
            if let Some(session_id) = require_session(state, connection_id, seq, tx).await {
                submit(session_id, text, seq, state, tx).await;
            }
        }
        ClientMessage::SetMode { mode, seq } => {
            let Some(session_id) = require_session(state, connection_id, seq, tx).await else {
                return;
            };
            match state.session_manager.set_mode_str(&session_id, &mode).await {
                Ok(session) => {
                    let _ = tx.send(ServerMessage::ModeChanged { session }).await;
                    ack(tx, seq).await;
                }
                Err(e) => reject_session_error(tx, seq, e).await,
            }
        }
        ClientMessage::Reset { seq } => {
            let Some(session_id) = require_session(state, connection_id, seq, tx).await else {
                return;
            };
            match state.session_manager.reset(&session_id).await {
                Ok(session) => {
                    let _ = tx.send(ServerMessage::SessionReset { session }).await;
                    ack(tx, seq).await;
                }
                Err(e) => reject_session_error(tx, seq, e).await,
            }
        }
    }
}

/// The session bound to this connection, or a `no_session` rejection
async fn require_session(
    state: &AppState,
    connection_id: Uuid,
    seq: u64,
    tx: &mpsc::Sender<ServerMessage>,
) -> Option<String> {
    let session_id = bound_session(state, connection_id).await;
    if session_id.is_none() {
        reject(
            tx,
            seq,
            ErrorCode::NoSession,
            "Start a session first".to_string(),
        )
        .await;
    }
    session_id
}

async fn start_session(
    mode: Option<String>,
    seq: u64,
    connection_id: Uuid,
    state: &AppState,
    tx: &mpsc::Sender<ServerMessage>,
) {
    if bound_session(state, connection_id).await.is_some() {
        let _ = tx
            .send(ServerMessage::Ack {
                ack_seq: seq,
                status: AckStatus::Rejected,
                reason: Some("Session already started".to_string()),
            })
            .await;
        return;
    }

    let mode = match mode.as_deref().map(str::parse::<Mode>).transpose() {
        Ok(mode) => mode.unwrap_or_default(),
        Err(e) => {
            reject_session_error(tx, seq, SessionError::from(e)).await;
            return;
        }
    };

    let session = match state.session_manager.create_session(mode).await {
        Ok(session) => session,
        Err(e) => {
            reject_session_error(tx, seq, e).await;
            return;
        }
    };

    {
        let mut connections = state.connections.write().await;
        if let Some(conn) = connections.get_mut(&connection_id) {
            conn.session_id = Some(session.id.clone());
        }
    }
    info!(
        "Connection {} started session {} in {} mode",
        connection_id, session.id, session.mode
    );

    let _ = tx.send(ServerMessage::SessionStarted { session }).await;
    ack(tx, seq).await;
}

/// Record the user turn now, deliver the reply when the backend answers
async fn submit(
    session_id: String,
    text: String,
    seq: u64,
    state: &AppState,
    tx: &mpsc::Sender<ServerMessage>,
) {
    let pending = match state.session_manager.begin_submit(&session_id, &text).await {
        Ok(pending) => pending,
        Err(e) => {
            reject_session_error(tx, seq, e).await;
            return;
        }
    };

    let _ = tx
        .send(ServerMessage::Pending {
            seq,
            turn: pending.user_turn().clone(),
            label: profile_for(pending.mode()).pending_label.to_string(),
        })
        .await;
    ack(tx, seq).await;

    let manager = Arc::clone(&state.session_manager);
    let tx = tx.clone();
    tokio::spawn(async move {
        match manager.complete_submit(pending).await {
            Ok(turn) => {
                let _ = tx.send(ServerMessage::AssistantTurn { seq, turn }).await;
            }
            Err(e @ (SessionError::SessionEnded | SessionError::Superseded)) => {
                debug!("Dropping reply {} for session {}: {}", seq, session_id, e);
            }
            Err(e) => {
                let _ = tx
                    .send(ServerMessage::Error {
                        seq: Some(seq),
                        code: e.code(),
                        message: e.user_message(),
                    })
                    .await;
            }
        }
    });
}
