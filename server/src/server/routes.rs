//! HTTP route handlers for the chat session API

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use super::AppState;
use crate::inference::InferenceError;
use crate::persona::Mode;
use crate::protocol::{
    CreateSessionRequest, ErrorResponse, SessionSnapshot, SetModeRequest, SubmitRequest,
    SubmitResponse, SuggestionsResponse,
};
use crate::session::SessionError;

/// Error response for the session API
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        let status = match &e {
            SessionError::NotFound(_) | SessionError::SessionEnded => StatusCode::NOT_FOUND,
            SessionError::InvalidMode(_) | SessionError::EmptyMessage => StatusCode::BAD_REQUEST,
            SessionError::Busy | SessionError::Superseded => StatusCode::CONFLICT,
            SessionError::TooManySessions(_) => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::Inference(InferenceError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            SessionError::Inference(_) => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            body: ErrorResponse {
                error: e.user_message(),
                code: e.code().as_str().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build the session API router (mounted under `/api`)
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(end_session))
        .route("/sessions/:id/messages", post(submit))
        .route("/sessions/:id/mode", put(set_mode))
        .route("/sessions/:id/reset", post(reset))
        .route("/suggestions/:mode", get(suggestions))
}

/// POST /api/sessions - Start a chat, Kid mode unless asked otherwise
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let mode = match request.mode.as_deref() {
        Some(raw) => raw.parse::<Mode>().map_err(SessionError::from)?,
        None => Mode::default(),
    };

    let snapshot = state.session_manager.create_session(mode).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// GET /api/sessions/:id
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state.session_manager.snapshot(&id).await.map_err(|e| {
        tracing::debug!("Session lookup failed for {}: {}", id, e);
        ApiError::from(e)
    })?;
    Ok(Json(snapshot))
}

/// DELETE /api/sessions/:id
async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.session_manager.end_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sessions/:id/messages - Submit a user turn and wait for the reply
async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let turn = state
        .session_manager
        .submit(&id, &request.text)
        .await
        .map_err(|e| {
            match &e {
                SessionError::Inference(inner) => {
                    tracing::error!("Submit failed for session {}: {}", id, inner);
                }
                other => tracing::debug!("Submit rejected for session {}: {}", id, other),
            }
            ApiError::from(e)
        })?;

    let session = state.session_manager.snapshot(&id).await?;
    Ok(Json(SubmitResponse { turn, session }))
}

/// PUT /api/sessions/:id/mode - Switch persona, clearing the conversation
async fn set_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetModeRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state
        .session_manager
        .set_mode_str(&id, &request.mode)
        .await?;
    Ok(Json(snapshot))
}

/// POST /api/sessions/:id/reset
async fn reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state.session_manager.reset(&id).await?;
    Ok(Json(snapshot))
}

/// GET /api/suggestions/:mode
async fn suggestions(
    State(state): State<AppState>,
    Path(raw_mode): Path<String>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let mode: Mode = raw_mode.parse().map_err(SessionError::from)?;
    let suggestions = state
        .session_manager
        .suggestions(mode)
        .iter()
        .map(|s| s.to_string())
        .collect();
    Ok(Json(SuggestionsResponse { mode, suggestions }))
}
