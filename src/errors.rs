use thiserror::Error;

/// Convenience alias for fallible results across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type surfaced by the gateway.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("LLM call failed: {0}")]
    Llm(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("agent loop exceeded max iterations ({0})")]
    MaxIterations(usize),

    #[error("deadline exceeded")]
    DeadlineExceeded,
}
