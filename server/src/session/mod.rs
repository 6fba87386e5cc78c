pub mod manager;
pub mod state;

pub use manager::{INFERENCE_FAILURE_MESSAGE, PendingSubmit, SessionError, SessionManager};
pub use state::{Session, SessionConfig, SessionId};
