//! Server configuration
//!
//! Configuration is loaded from environment variables on top of defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,

    /// Hosted model configuration
    pub inference: InferenceConfig,

    /// Session configuration
    pub session: SessionConfig,

    /// Static file serving configuration
    pub static_files: StaticFilesConfig,
}

/// OpenAI-compatible chat completion endpoint
#[derive(Clone)]
pub struct InferenceConfig {
    /// API base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Bearer token; empty for local servers that need none
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Sampling temperature (provider default when unset)
    pub temperature: Option<f32>,
}

/// Session-related configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sessions idle longer than this are destroyed
    pub idle_timeout: Duration,
    /// Maximum concurrent sessions
    pub max_sessions: usize,
    /// How often the expiry sweep runs
    pub cleanup_interval: Duration,
}

/// Static file serving (chat front-end)
#[derive(Debug, Clone, Default)]
pub struct StaticFilesConfig {
    /// Directory to serve; disabled when unset
    pub dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            inference: InferenceConfig::default(),
            session: SessionConfig::default(),
            static_files: StaticFilesConfig::default(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: String::new(),
            model: "llama-3.1-8b-instant".to_string(),
            timeout: Duration::from_secs(60),
            temperature: None,
        }
    }
}

// Hand-written so the API key never reaches the logs
impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60 * 60), // 1 hour
            max_sessions: 500,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Server config
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Inference config
        if let Some(url) = lookup("INFERENCE_BASE_URL")
            && !url.is_empty()
        {
            config.inference.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = lookup("INFERENCE_API_KEY").or_else(|| lookup("GROQ_API_KEY")) {
            config.inference.api_key = key;
        }
        if let Some(model) = lookup("INFERENCE_MODEL")
            && !model.is_empty()
        {
            config.inference.model = model;
        }
        if let Some(val) = lookup("INFERENCE_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.inference.timeout = Duration::from_secs(secs);
        }
        if let Some(val) = lookup("INFERENCE_TEMPERATURE")
            && let Ok(t) = val.parse::<f32>()
        {
            config.inference.temperature = Some(t);
        }

        // Session config
        if let Some(val) = lookup("SESSION_IDLE_TIMEOUT_MINS")
            && let Ok(mins) = val.parse::<u64>()
        {
            config.session.idle_timeout = Duration::from_secs(mins.saturating_mul(60));
        }
        if let Some(val) = lookup("MAX_SESSIONS")
            && let Ok(v) = val.parse()
        {
            config.session.max_sessions = v;
        }
        if let Some(val) = lookup("SESSION_CLEANUP_INTERVAL_SECS")
            && let Ok(secs) = val.parse::<u64>()
            && secs > 0
        {
            config.session.cleanup_interval = Duration::from_secs(secs);
        }

        // Static files
        if let Some(dir) = lookup("STATIC_FILES_DIR")
            && !dir.is_empty()
        {
            config.static_files.dir = Some(PathBuf::from(dir));
        }

        config
    }
}
