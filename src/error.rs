//! Error taxonomy for the import pipeline.
//!
//! Every variant here is recoverable from the batch's point of view: the
//! orchestrator logs it with provider and item context and moves on. Only
//! the CLI entry point turns errors into a non-zero exit.

use thiserror::Error;

/// Problems with a provider entry or the configuration file itself.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("provider entry is missing `{0}`")]
    MissingField(&'static str),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failure to obtain a usable raw response for one provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no gateway configured for {api_id}/{endpoint_id}")]
    GatewayMissing { api_id: String, endpoint_id: String },

    #[error("invalid response shape: {0}")]
    InvalidShape(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

/// Errors reported by an AI provider for a single call.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI provider `{0}` is not configured (missing or invalid credentials)")]
    Unconfigured(&'static str),

    #[error("rate limit reached: {0}")]
    RateLimited(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("provider error: {0}")]
    Api(String),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl AiError {
    /// Whether this error should use the longer rate-limit backoff.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            AiError::RateLimited(_) => true,
            other => other.to_string().to_lowercase().contains("rate limit"),
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Http(err.to_string())
    }
}

/// Terminal outcome of a rewrite that did not produce accepted text.
#[derive(Debug, Error)]
pub enum RewriteFailure {
    #[error("all {attempts} rewrite attempts failed; last error: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("rewrite cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    #[error("AI provider unavailable: {0}")]
    Unavailable(String),
}

/// Reasons an image could not be resolved from a source page.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid page url `{0}`")]
    InvalidUrl(String),

    #[error("page returned HTTP {0}")]
    Status(u16),

    #[error("page fetch failed: {0}")]
    Fetch(String),
}

impl From<reqwest::Error> for ImageError {
    fn from(err: reqwest::Error) -> Self {
        ImageError::Fetch(err.to_string())
    }
}

/// Errors raised by a persistence backend.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("a record with fingerprint {0} already exists")]
    Conflict(String),

    #[error("record {0} not found")]
    NotFound(u64),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
