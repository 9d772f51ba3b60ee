// =============================================================================
// error.rs — EVERYTHING THAT CAN GO WRONG, SORTED INTO FIVE BUCKETS
// =============================================================================
//
// Banks redesign their pages, the comparison site times out, a cell says
// "yakında" where a percentage should be. Each of those lands in exactly one
// of the variants below, and the variant decides what happens next:
//
//   Fetch / Parse / Timeout  -> retried, then skipped and reported
//   Config / Storage         -> the run is over
// =============================================================================

use thiserror::Error;

pub type RateResult<T> = Result<T, RateError>;

#[derive(Debug, Error)]
pub enum RateError {
    /// Network or HTTP failure while loading a page.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Expected markup was missing or its text could not be turned into numbers.
    #[error("parse failed: {0}")]
    Parse(String),

    /// A rendered element never became visible.
    #[error("timed out after {seconds}s waiting for {locator}")]
    Timeout { locator: String, seconds: u64 },

    /// The source registry or the engine configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The snapshot sink refused a write or a read.
    #[error("storage error: {0}")]
    Storage(String),
}

impl RateError {
    /// Transient kinds are worth another attempt; the rest abort the run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RateError::Fetch(_) | RateError::Parse(_) | RateError::Timeout { .. }
        )
    }

    /// Short machine-friendly name, used in failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RateError::Fetch(_) => "fetch",
            RateError::Parse(_) => "parse",
            RateError::Timeout { .. } => "timeout",
            RateError::Config(_) => "config",
            RateError::Storage(_) => "storage",
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        RateError::Parse(message.into())
    }
}

impl From<reqwest::Error> for RateError {
    fn from(err: reqwest::Error) -> Self {
        RateError::Fetch(err.to_string())
    }
}

impl From<redis::RedisError> for RateError {
    fn from(err: redis::RedisError) -> Self {
        RateError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RateError {
    fn from(err: serde_json::Error) -> Self {
        RateError::Storage(format!("snapshot encoding: {err}"))
    }
}

impl From<std::io::Error> for RateError {
    fn from(err: std::io::Error) -> Self {
        RateError::Storage(err.to_string())
    }
}
