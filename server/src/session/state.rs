use crate::inference::{Agent, InferenceBackend};
use crate::persona::{Mode, instructions_for, profile_for};
use crate::protocol::{SessionSnapshot, SidebarSnapshot, Turn};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Session ID: 10-character base32 string (lowercase, a-z + 2-7)
pub type SessionId = String;

/// Charset for session IDs: lowercase base32 (a-z, 2-7) to avoid 0/1 confusion
const SESSION_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";
const SESSION_ID_LENGTH: usize = 10;

/// Generate a random session ID
pub fn generate_session_id() -> SessionId {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut id = String::with_capacity(SESSION_ID_LENGTH);
    let hasher = RandomState::new();

    for i in 0..SESSION_ID_LENGTH {
        let mut h = hasher.build_hasher();
        h.write_usize(i);
        h.write_u128(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
        );
        h.write_u128(Uuid::new_v4().as_u128());

        let idx = (h.finish() as usize) % SESSION_ID_CHARSET.len();
        id.push(SESSION_ID_CHARSET[idx] as char);
    }

    id
}

/// Validation rules
pub fn validate_session_id(id: &str) -> bool {
    if id.len() != SESSION_ID_LENGTH {
        return false;
    }
    id.chars().all(|c| SESSION_ID_CHARSET.contains(&(c as u8)))
}

/// Deadline `idle_timeout` after `now`, clamped at `u64::MAX`
fn expiry_after(now: u64, idle_timeout: Duration) -> u64 {
    let millis = u64::try_from(idle_timeout.as_millis()).unwrap_or(u64::MAX);
    now.saturating_add(millis)
}

/// Get current timestamp in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One user's chat: mode, transcript and model handle
pub struct Session {
    pub id: SessionId,
    pub mode: Mode,

    /// Transcript shown to the user
    pub history: Vec<Turn>,
    pub agent: Agent,

    // Timestamps
    pub created_at: u64,
    pub last_active_at: u64,
    pub expires_at: u64,

    /// A submit is awaiting the backend
    pub pending: bool,
    /// Bumped on every reset and mode switch; in-flight replies from an
    /// older generation are dropped
    pub generation: u64,
    /// Set once the session is torn down; late replies are dropped
    pub ended: bool,
}

impl Session {
    pub fn new(
        id: SessionId,
        mode: Mode,
        backend: Arc<dyn InferenceBackend>,
        idle_timeout: Duration,
    ) -> Self {
        let now = now_millis();
        Self {
            id,
            mode,
            history: Vec::new(),
            agent: Agent::new(backend, instructions_for(mode)),
            created_at: now,
            last_active_at: now,
            expires_at: expiry_after(now, idle_timeout),
            pending: false,
            generation: 0,
            ended: false,
        }
    }

    /// Mark activity and push expiry out
    pub fn touch(&mut self, idle_timeout: Duration) {
        let now = now_millis();
        self.last_active_at = now;
        self.expires_at = expiry_after(now, idle_timeout);
    }

    /// Switch persona: new instructions, empty transcript and memory
    pub fn apply_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.start_fresh();
    }

    /// Drop the conversation, keep the mode
    pub fn start_fresh(&mut self) {
        self.agent.rebuild(instructions_for(self.mode));
        self.history.clear();
        self.pending = false;
        self.generation += 1;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let profile = profile_for(self.mode);
        SessionSnapshot {
            id: self.id.clone(),
            mode: self.mode,
            persona_name: profile.persona_name.to_string(),
            title: profile.title.to_string(),
            welcome_message: profile.welcome_message.to_string(),
            input_placeholder: profile.input_placeholder.to_string(),
            pending_label: profile.pending_label.to_string(),
            pending: self.pending,
            history: self.history.clone(),
            suggestions: profile.suggestions.iter().map(|s| s.to_string()).collect(),
            sidebar: SidebarSnapshot {
                heading: profile.sidebar.heading.to_string(),
                intro: profile.sidebar.intro.to_string(),
                guide_title: profile.sidebar.guide_title.to_string(),
                guide_items: profile
                    .sidebar
                    .guide_items
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                footer: profile.sidebar.footer.to_string(),
            },
        }
    }
}

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_timeout: Duration,
    pub max_sessions: usize,
    /// Upper bound on one backend call
    pub inference_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60 * 60), // 1 hour
            max_sessions: 500,
            inference_timeout: Duration::from_secs(60),
        }
    }
}
