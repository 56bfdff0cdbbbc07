#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid topic '{0}': expected doc:<id>:locks")]
    InvalidTopic(String),

    #[error("Malformed message: {0}")]
    Codec(#[from] serde_json::Error),
}
