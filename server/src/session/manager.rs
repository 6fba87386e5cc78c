use crate::inference::{InferenceBackend, InferenceError, PreparedCall};
use crate::persona::{InvalidModeError, Mode, suggestions_for};
use crate::protocol::{ErrorCode, SessionSnapshot, Turn};
use crate::session::state::{
    Session, SessionConfig, SessionId, generate_session_id, now_millis, validate_session_id,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Shown to the user for any failed model call
pub const INFERENCE_FAILURE_MESSAGE: &str = "Something went wrong, try again";

/// Session manager errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Too many active sessions (max {0})")]
    TooManySessions(usize),

    #[error("A reply is already being generated for this session")]
    Busy,

    #[error("Message is empty")]
    EmptyMessage,

    #[error(transparent)]
    InvalidMode(#[from] InvalidModeError),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Session ended before the reply arrived")]
    SessionEnded,

    #[error("Conversation changed before the reply arrived")]
    Superseded,
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::NotFound(_) | SessionError::SessionEnded => ErrorCode::SessionNotFound,
            SessionError::TooManySessions(_) => ErrorCode::TooManySessions,
            SessionError::Busy => ErrorCode::Busy,
            SessionError::EmptyMessage => ErrorCode::EmptyMessage,
            SessionError::InvalidMode(_) => ErrorCode::InvalidMode,
            SessionError::Inference(_) => ErrorCode::InferenceFailed,
            SessionError::Superseded => ErrorCode::Superseded,
        }
    }

    /// Text the chat UI shows in place of a reply
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Inference(_) => INFERENCE_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// A submitted user turn whose reply has not been generated yet.
///
/// Dropping it before [`SessionManager::complete_submit`] records an outcome
/// clears the session's pending flag, so a caller that goes away mid-call
/// does not leave the session busy.
pub struct PendingSubmit {
    session_id: SessionId,
    handle: Arc<Mutex<Session>>,
    call: PreparedCall,
    user_turn: Turn,
    generation: u64,
    settled: bool,
}

impl PendingSubmit {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The user turn already appended to the transcript
    pub fn user_turn(&self) -> &Turn {
        &self.user_turn
    }

    /// Mode whose instructions the reply is generated under
    pub fn mode(&self) -> Mode {
        self.call.instructions().mode()
    }
}

impl Drop for PendingSubmit {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        counter!("science_explorer_submits_abandoned_total").increment(1);

        if let Ok(mut session) = self.handle.try_lock() {
            release_abandoned(&mut session, self.generation, &self.session_id);
            return;
        }

        // Lock is contended; finish the release on the runtime
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handle = Arc::clone(&self.handle);
                let generation = self.generation;
                let session_id = std::mem::take(&mut self.session_id);
                runtime.spawn(async move {
                    let mut session = handle.lock().await;
                    release_abandoned(&mut session, generation, &session_id);
                });
            }
            Err(_) => warn!(
                "Submit for session {} dropped outside a runtime; pending flag left set",
                self.session_id
            ),
        }
    }
}

/// Clear `pending` for a submit nobody is waiting on any more
fn release_abandoned(session: &mut Session, generation: u64, session_id: &str) {
    if session.ended || session.generation != generation || !session.pending {
        return;
    }
    session.pending = false;
    debug!("Released abandoned submit for session {}", session_id);
}

/// Session manager: owns every live chat session
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<Mutex<Session>>>,
    /// Slots reserved against `max_sessions`, taken before insert
    live: AtomicUsize,
    backend: Arc<dyn InferenceBackend>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self::with_config(backend, SessionConfig::default())
    }

    pub fn with_config(backend: Arc<dyn InferenceBackend>, config: SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            live: AtomicUsize::new(0),
            backend,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a new session in `mode`
    pub async fn create_session(&self, mode: Mode) -> Result<SessionSnapshot, SessionError> {
        let reserved = self.live.fetch_add(1, Ordering::SeqCst);
        if reserved >= self.config.max_sessions {
            self.live.fetch_sub(1, Ordering::SeqCst);
            warn!("Rejecting new session: {} sessions active", reserved);
            return Err(SessionError::TooManySessions(self.config.max_sessions));
        }

        let (session_id, handle) = loop {
            let id = generate_session_id();
            if let Entry::Vacant(slot) = self.sessions.entry(id.clone()) {
                let session = Session::new(
                    id.clone(),
                    mode,
                    Arc::clone(&self.backend),
                    self.config.idle_timeout,
                );
                let handle = Arc::new(Mutex::new(session));
                slot.insert(Arc::clone(&handle));
                break (id, handle);
            }
        };

        counter!("science_explorer_sessions_created_total", "mode" => mode.as_str()).increment(1);
        info!("Created session {} in {} mode", session_id, mode);

        let session = handle.lock().await;
        Ok(session.snapshot())
    }

    fn handle(&self, session_id: &str) -> Result<Arc<Mutex<Session>>, SessionError> {
        if !validate_session_id(session_id) {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Get session snapshot
    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        let handle = self.handle(session_id)?;
        let session = handle.lock().await;
        Ok(session.snapshot())
    }

    pub async fn current_mode(&self, session_id: &str) -> Result<Mode, SessionError> {
        let handle = self.handle(session_id)?;
        let session = handle.lock().await;
        Ok(session.mode)
    }

    /// Transcript to render, oldest first
    pub async fn history(&self, session_id: &str) -> Result<Vec<Turn>, SessionError> {
        let handle = self.handle(session_id)?;
        let session = handle.lock().await;
        Ok(session.history.clone())
    }

    /// Quick prompts for a mode
    pub fn suggestions(&self, mode: Mode) -> &'static [&'static str] {
        suggestions_for(mode)
    }

    /// Switch persona. The agent is rebuilt with the new instructions and
    /// both the transcript and the model memory are cleared.
    pub async fn set_mode(
        &self,
        session_id: &str,
        mode: Mode,
    ) -> Result<SessionSnapshot, SessionError> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;

        let previous = session.mode;
        session.apply_mode(mode);
        session.touch(self.config.idle_timeout);

        counter!(
            "science_explorer_mode_switches_total",
            "from" => previous.as_str(),
            "to" => mode.as_str()
        )
        .increment(1);
        info!(
            "Session {} switched mode {} -> {}",
            session_id, previous, mode
        );

        Ok(session.snapshot())
    }

    /// Parse a client-supplied mode name, then switch to it
    pub async fn set_mode_str(
        &self,
        session_id: &str,
        raw_mode: &str,
    ) -> Result<SessionSnapshot, SessionError> {
        let mode: Mode = raw_mode.parse()?;
        self.set_mode(session_id, mode).await
    }

    /// Start over: empty transcript, fresh agent, same mode
    pub async fn reset(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;

        session.start_fresh();
        session.touch(self.config.idle_timeout);

        counter!("science_explorer_session_resets_total").increment(1);
        info!("Session {} reset in {} mode", session_id, session.mode);

        Ok(session.snapshot())
    }

    /// Send a user turn and wait for the assistant turn.
    ///
    /// The user turn is recorded before the backend is called and stays in
    /// the transcript even if the call fails. Only one submit may be in
    /// flight per session.
    pub async fn submit(&self, session_id: &str, text: &str) -> Result<Turn, SessionError> {
        let pending = self.begin_submit(session_id, text).await?;
        self.complete_submit(pending).await
    }

    /// First half of [`submit`](Self::submit): record the user turn and
    /// mark the session pending. Fails fast with `Busy` if a reply is
    /// already being generated.
    pub async fn begin_submit(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<PendingSubmit, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;
        if session.pending {
            counter!("science_explorer_submits_rejected_total", "reason" => "busy").increment(1);
            return Err(SessionError::Busy);
        }

        let user_turn = Turn::user(text, now_millis());
        session.history.push(user_turn.clone());
        session.pending = true;
        session.touch(self.config.idle_timeout);

        let call = session.agent.prepare(text);
        let generation = session.generation;
        drop(session);

        counter!("science_explorer_turns_total", "role" => "user").increment(1);
        debug!(
            "Session {} submitted turn ({} chars, {} mode)",
            session_id,
            text.len(),
            call.instructions().mode()
        );

        Ok(PendingSubmit {
            session_id: session_id.to_string(),
            handle,
            call,
            user_turn,
            generation,
            settled: false,
        })
    }

    /// Second half of [`submit`](Self::submit): call the backend without
    /// holding the session lock, then record the reply unless the session
    /// ended or the conversation changed in the meantime.
    pub async fn complete_submit(
        &self,
        mut pending: PendingSubmit,
    ) -> Result<Turn, SessionError> {
        let start = Instant::now();
        let outcome =
            match tokio::time::timeout(self.config.inference_timeout, pending.call.invoke()).await
            {
                Ok(result) => result,
                Err(_) => Err(InferenceError::Timeout(self.config.inference_timeout)),
            };
        histogram!("science_explorer_inference_duration_seconds").record(start.elapsed());

        let handle = Arc::clone(&pending.handle);
        let mut session = handle.lock().await;
        pending.settled = true;
        let session_id = pending.session_id.as_str();
        let generation = pending.generation;

        if session.ended {
            counter!("science_explorer_replies_discarded_total", "reason" => "session_ended")
                .increment(1);
            info!("Discarding reply for ended session {}", session_id);
            return Err(SessionError::SessionEnded);
        }

        if session.generation != generation {
            counter!("science_explorer_replies_discarded_total", "reason" => "superseded")
                .increment(1);
            debug!(
                "Discarding reply for session {}: conversation changed mid-flight",
                session_id
            );
            return Err(SessionError::Superseded);
        }

        session.pending = false;
        session.touch(self.config.idle_timeout);

        match outcome {
            Ok(reply) => {
                let assistant_turn = Turn::assistant(reply, now_millis());
                session.history.push(assistant_turn.clone());
                session
                    .agent
                    .remember(pending.user_turn.clone(), assistant_turn.clone());
                counter!("science_explorer_turns_total", "role" => "assistant").increment(1);
                Ok(assistant_turn)
            }
            Err(e) => {
                counter!(
                    "science_explorer_inference_failures_total",
                    "backend" => session.agent.backend_name()
                )
                .increment(1);
                warn!("Inference failed for session {}: {}", session_id, e);
                Err(SessionError::Inference(e))
            }
        }
    }

    /// Destroy a session. A reply still in flight is discarded.
    pub async fn end_session(&self, session_id: &str) -> Result<(), SessionError> {
        let (_, handle) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        self.live.fetch_sub(1, Ordering::SeqCst);
        handle.lock().await.ended = true;
        counter!("science_explorer_sessions_ended_total", "reason" => "closed").increment(1);
        info!("Ended session {}", session_id);
        Ok(())
    }

    /// Remove sessions idle past their expiry
    pub async fn cleanup_expired(&self) -> usize {
        let now = now_millis();

        // Sessions locked right now are in use, so they are not idle
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .try_lock()
                    .map(|session| session.expires_at < now && !session.pending)
                    .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in expired {
            if let Some((_, handle)) = self.sessions.remove(&id) {
                self.live.fetch_sub(1, Ordering::SeqCst);
                handle.lock().await.ended = true;
                info!("Removing expired session: {}", id);
                counter!("science_explorer_sessions_ended_total", "reason" => "expired")
                    .increment(1);
                removed += 1;
            }
        }
        removed
    }

    /// Get count of active sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::instructions_for;
    use crate::protocol::Role;
    use crate::test_utils::ScriptedBackend;
    use std::time::Duration;

    fn manager_with(backend: Arc<ScriptedBackend>) -> SessionManager {
        SessionManager::new(backend)
    }

    #[tokio::test]
    async fn test_create_session_defaults() {
        let manager = manager_with(Arc::new(ScriptedBackend::replying("ok")));

        let snapshot = manager.create_session(Mode::Kid).await.unwrap();
        assert_eq!(snapshot.id.len(), 10);
        assert_eq!(snapshot.mode, Mode::Kid);
        assert!(snapshot.history.is_empty());
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn test_create_session_respects_limit() {
        let config = SessionConfig {
            max_sessions: 1,
            ..SessionConfig::default()
        };
        let manager =
            SessionManager::with_config(Arc::new(ScriptedBackend::replying("ok")), config);

        manager.create_session(Mode::Kid).await.unwrap();
        let result = manager.create_session(Mode::Kid).await;
        assert!(matches!(result, Err(SessionError::TooManySessions(1))));
    }

    #[tokio::test]
    async fn test_concurrent_creates_never_exceed_limit() {
        let config = SessionConfig {
            max_sessions: 5,
            ..SessionConfig::default()
        };
        let manager = Arc::new(SessionManager::with_config(
            Arc::new(ScriptedBackend::replying("ok")),
            config,
        ));

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.create_session(Mode::Kid).await })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(matches!(e, SessionError::TooManySessions(5))),
            }
        }
        assert_eq!(created, 5);
        assert_eq!(manager.session_count(), 5);
    }

    #[tokio::test]
    async fn test_ended_session_frees_its_slot() {
        let config = SessionConfig {
            max_sessions: 1,
            ..SessionConfig::default()
        };
        let manager =
            SessionManager::with_config(Arc::new(ScriptedBackend::replying("ok")), config);

        let first = manager.create_session(Mode::Kid).await.unwrap();
        manager.end_session(&first.id).await.unwrap();
        manager.create_session(Mode::Parent).await.unwrap();
        assert!(matches!(
            manager.create_session(Mode::Kid).await,
            Err(SessionError::TooManySessions(1))
        ));
    }

    #[tokio::test]
    async fn test_malformed_session_id_is_not_found() {
        let manager = manager_with(Arc::new(ScriptedBackend::replying("ok")));
        manager.create_session(Mode::Kid).await.unwrap();

        for id in ["", "ABCD234567", "abcd01", "abcd2345678", "../etc/pwd"] {
            let err = manager.snapshot(id).await.unwrap_err();
            assert!(matches!(err, SessionError::NotFound(_)), "{id:?}");
        }
    }

    #[tokio::test]
    async fn test_submit_appends_user_then_assistant() {
        let backend = Arc::new(ScriptedBackend::replying(
            "Great question! What do you notice about...",
        ));
        let manager = manager_with(backend.clone());
        let session = manager.create_session(Mode::Kid).await.unwrap();

        let turn = manager
            .submit(&session.id, "Why is the sky blue?")
            .await
            .unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "Great question! What do you notice about...");

        let history = manager.history(&session.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "Why is the sky blue?");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "Great question! What do you notice about...");

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].mode, Mode::Kid);
        assert!(calls[0].prior_turns.is_empty());
    }

    #[tokio::test]
    async fn test_submit_sends_prior_turns_to_backend() {
        let backend = Arc::new(ScriptedBackend::replying("reply"));
        let manager = manager_with(backend.clone());
        let session = manager.create_session(Mode::Kid).await.unwrap();

        manager.submit(&session.id, "first").await.unwrap();
        manager.submit(&session.id, "second").await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].prior_turns.len(), 2);
        assert_eq!(calls[1].prior_turns[0].content, "first");
        assert_eq!(calls[1].input, "second");
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_only_user_turn_and_recovers() {
        let backend = Arc::new(ScriptedBackend::sequence(vec![
            Err(InferenceError::Transport("connection refused".to_string())),
            Ok("Back online!".to_string()),
        ]));
        let manager = manager_with(backend.clone());
        let session = manager.create_session(Mode::Kid).await.unwrap();

        let err = manager.submit(&session.id, "hello?").await.unwrap_err();
        assert!(matches!(err, SessionError::Inference(_)));
        assert_eq!(err.user_message(), INFERENCE_FAILURE_MESSAGE);
        assert_eq!(err.code(), ErrorCode::InferenceFailed);

        let history = manager.history(&session.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);

        let snapshot = manager.snapshot(&session.id).await.unwrap();
        assert!(!snapshot.pending);

        // The session stays usable
        let turn = manager.submit(&session.id, "hello again").await.unwrap();
        assert_eq!(turn.content, "Back online!");
        assert_eq!(manager.history(&session.id).await.unwrap().len(), 3);

        // The failed exchange never reached model memory
        let calls = backend.calls();
        assert!(calls[1].prior_turns.is_empty());
    }

    #[tokio::test]
    async fn test_submit_times_out() {
        let backend = Arc::new(ScriptedBackend::replying("late").with_delay(Duration::from_secs(5)));
        let config = SessionConfig {
            inference_timeout: Duration::from_millis(20),
            ..SessionConfig::default()
        };
        let manager = SessionManager::with_config(backend, config);
        let session = manager.create_session(Mode::Kid).await.unwrap();

        let err = manager.submit(&session.id, "anyone there?").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Inference(InferenceError::Timeout(_))
        ));
        assert_eq!(manager.history(&session.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_submit_is_rejected() {
        let manager = manager_with(Arc::new(ScriptedBackend::replying("ok")));
        let session = manager.create_session(Mode::Kid).await.unwrap();

        let err = manager.submit(&session.id, "   ").await.unwrap_err();
        assert!(matches!(err, SessionError::EmptyMessage));
        assert!(manager.history(&session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_unknown_session() {
        let manager = manager_with(Arc::new(ScriptedBackend::replying("ok")));
        let err = manager.submit("abcd234567", "hi").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_rejected_as_busy() {
        let backend = Arc::new(ScriptedBackend::replying("done").gated());
        let manager = Arc::new(manager_with(backend.clone()));
        let session = manager.create_session(Mode::Kid).await.unwrap();

        let first = {
            let manager = Arc::clone(&manager);
            let id = session.id.clone();
            tokio::spawn(async move { manager.submit(&id, "first").await })
        };
        backend.wait_for_calls(1).await;

        let second = manager.submit(&session.id, "second").await;
        assert!(matches!(second, Err(SessionError::Busy)));
        assert!(manager.snapshot(&session.id).await.unwrap().pending);

        backend.release();
        let turn = first.await.unwrap().unwrap();
        assert_eq!(turn.content, "done");

        let history = manager.history(&session.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
    }

    #[tokio::test]
    async fn test_abandoned_submit_releases_session() {
        let backend = Arc::new(ScriptedBackend::replying("answer").gated());
        let manager = Arc::new(manager_with(backend.clone()));
        let session = manager.create_session(Mode::Kid).await.unwrap();

        let first = {
            let manager = Arc::clone(&manager);
            let id = session.id.clone();
            tokio::spawn(async move { manager.submit(&id, "first").await })
        };
        backend.wait_for_calls(1).await;
        assert!(manager.snapshot(&session.id).await.unwrap().pending);

        // Caller goes away mid-call, as when an HTTP client disconnects
        first.abort();
        let _ = first.await;

        let snapshot = manager.snapshot(&session.id).await.unwrap();
        assert!(!snapshot.pending);
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].content, "first");

        let second = {
            let manager = Arc::clone(&manager);
            let id = session.id.clone();
            tokio::spawn(async move { manager.submit(&id, "second").await })
        };
        backend.wait_for_calls(2).await;
        backend.release();
        let turn = second.await.unwrap().unwrap();
        assert_eq!(turn.content, "answer");
        assert_eq!(manager.history(&session.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_abandoned_submit_does_not_block_cleanup() {
        let backend = Arc::new(ScriptedBackend::replying("answer").gated());
        let config = SessionConfig {
            idle_timeout: Duration::from_millis(1),
            ..SessionConfig::default()
        };
        let manager = Arc::new(SessionManager::with_config(backend.clone(), config));
        let session = manager.create_session(Mode::Kid).await.unwrap();

        let task = {
            let manager = Arc::clone(&manager);
            let id = session.id.clone();
            tokio::spawn(async move { manager.submit(&id, "hello").await })
        };
        backend.wait_for_calls(1).await;
        task.abort();
        let _ = task.await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(manager.cleanup_expired().await, 1);
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_pending_submit_after_reset_leaves_new_state_alone() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let manager = manager_with(backend);
        let session = manager.create_session(Mode::Kid).await.unwrap();

        let pending = manager.begin_submit(&session.id, "stale").await.unwrap();
        manager.reset(&session.id).await.unwrap();
        let fresh = manager.begin_submit(&session.id, "fresh").await.unwrap();

        drop(pending);
        assert!(manager.snapshot(&session.id).await.unwrap().pending);

        manager.complete_submit(fresh).await.unwrap();
        let snapshot = manager.snapshot(&session.id).await.unwrap();
        assert!(!snapshot.pending);
        assert_eq!(snapshot.history.len(), 2);
    }

    #[tokio::test]
    async fn test_reply_discarded_when_session_ends_mid_flight() {
        let backend = Arc::new(ScriptedBackend::replying("too late").gated());
        let manager = Arc::new(manager_with(backend.clone()));
        let session = manager.create_session(Mode::Kid).await.unwrap();

        let pending = {
            let manager = Arc::clone(&manager);
            let id = session.id.clone();
            tokio::spawn(async move { manager.submit(&id, "question").await })
        };
        backend.wait_for_calls(1).await;

        manager.end_session(&session.id).await.unwrap();
        backend.release();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SessionError::SessionEnded)));
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_reply_discarded_when_mode_switches_mid_flight() {
        let backend = Arc::new(ScriptedBackend::replying("kid answer").gated());
        let manager = Arc::new(manager_with(backend.clone()));
        let session = manager.create_session(Mode::Kid).await.unwrap();

        let pending = {
            let manager = Arc::clone(&manager);
            let id = session.id.clone();
            tokio::spawn(async move { manager.submit(&id, "question").await })
        };
        backend.wait_for_calls(1).await;

        manager.set_mode(&session.id, Mode::Parent).await.unwrap();
        backend.release();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SessionError::Superseded)));

        // The kid-mode reply never lands in the parent-mode conversation
        let snapshot = manager.snapshot(&session.id).await.unwrap();
        assert_eq!(snapshot.mode, Mode::Parent);
        assert!(snapshot.history.is_empty());
        assert!(!snapshot.pending);
    }

    #[tokio::test]
    async fn test_set_mode_switches_instructions_and_clears_history() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let manager = manager_with(backend.clone());
        let session = manager.create_session(Mode::Kid).await.unwrap();

        manager.submit(&session.id, "kid question").await.unwrap();
        let snapshot = manager.set_mode(&session.id, Mode::Parent).await.unwrap();
        assert_eq!(snapshot.mode, Mode::Parent);
        assert!(snapshot.history.is_empty());
        assert_eq!(snapshot.persona_name, "Dr. Morgan");

        manager.submit(&session.id, "parent question").await.unwrap();
        let calls = backend.calls();
        assert_eq!(calls[1].mode, Mode::Parent);
        assert_eq!(calls[1].directives, instructions_for(Mode::Parent).directives());
        assert!(calls[1].prior_turns.is_empty());
    }

    #[tokio::test]
    async fn test_set_mode_twice_is_idempotent() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let manager = manager_with(backend.clone());
        let session = manager.create_session(Mode::Kid).await.unwrap();

        manager.set_mode(&session.id, Mode::Parent).await.unwrap();
        manager.submit(&session.id, "once").await.unwrap();
        manager.set_mode(&session.id, Mode::Parent).await.unwrap();
        manager.set_mode(&session.id, Mode::Parent).await.unwrap();
        manager.submit(&session.id, "twice").await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls[0].directives, calls[1].directives);
        assert_eq!(
            manager.current_mode(&session.id).await.unwrap(),
            Mode::Parent
        );
    }

    #[tokio::test]
    async fn test_set_mode_str_rejects_unknown_mode() {
        let manager = manager_with(Arc::new(ScriptedBackend::replying("ok")));
        let session = manager.create_session(Mode::Kid).await.unwrap();
        manager.submit(&session.id, "keep me").await.unwrap();

        let err = manager
            .set_mode_str(&session.id, "grandparent")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidMode(_)));
        assert_eq!(err.code(), ErrorCode::InvalidMode);

        // Untouched
        let snapshot = manager.snapshot(&session.id).await.unwrap();
        assert_eq!(snapshot.mode, Mode::Kid);
        assert_eq!(snapshot.history.len(), 2);

        let snapshot = manager.set_mode_str(&session.id, "parent").await.unwrap();
        assert_eq!(snapshot.mode, Mode::Parent);
    }

    #[tokio::test]
    async fn test_reset_empties_history_and_keeps_mode() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let manager = manager_with(backend.clone());
        let session = manager.create_session(Mode::Parent).await.unwrap();

        // Reset on an empty session is fine too
        assert!(manager.reset(&session.id).await.unwrap().history.is_empty());

        manager.submit(&session.id, "one").await.unwrap();
        manager.submit(&session.id, "two").await.unwrap();
        let snapshot = manager.reset(&session.id).await.unwrap();
        assert!(snapshot.history.is_empty());
        assert_eq!(snapshot.mode, Mode::Parent);

        manager.submit(&session.id, "three").await.unwrap();
        let calls = backend.calls();
        assert!(calls[2].prior_turns.is_empty());
        assert_eq!(calls[2].mode, Mode::Parent);
    }

    #[tokio::test]
    async fn test_end_session_unknown() {
        let manager = manager_with(Arc::new(ScriptedBackend::replying("ok")));
        let result = manager.end_session("nonexistent").await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let config = SessionConfig {
            idle_timeout: Duration::from_millis(1),
            ..SessionConfig::default()
        };
        let manager =
            SessionManager::with_config(Arc::new(ScriptedBackend::replying("ok")), config);

        manager.create_session(Mode::Kid).await.unwrap();
        manager.create_session(Mode::Parent).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(manager.cleanup_expired().await, 2);
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_active_sessions() {
        let manager = manager_with(Arc::new(ScriptedBackend::replying("ok")));
        manager.create_session(Mode::Kid).await.unwrap();
        assert_eq!(manager.cleanup_expired().await, 0);
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn test_suggestions_lookup() {
        let manager = manager_with(Arc::new(ScriptedBackend::replying("ok")));
        assert_eq!(manager.suggestions(Mode::Kid)[1], "🧲 Magnets are cool!");
        assert_eq!(manager.suggestions(Mode::Parent)[2], "🏆 Judging criteria");
    }
}
