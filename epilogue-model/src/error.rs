use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid actor: {0}")]
    InvalidActor(String),

    #[error("invalid confidence {0}: must be within [0, 1]")]
    InvalidConfidence(f64),

    #[error("unknown source type: {0}")]
    UnknownSourceType(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
