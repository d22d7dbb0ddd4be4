use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Fatal on the write path: a production write without invalidation
    /// would leave stale cache behind.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model error: {0}")]
    Model(#[from] epilogue_model::ModelError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EnrichError>;
