use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelicError {
    #[error("Index {index} out of range (limit {limit})")]
    OutOfRange { index: u64, limit: u64 },

    #[error("Volume type unknown")]
    UnidentifiedVolume,

    #[error("No constructor registered for '{kind}' on a {variant} volume")]
    NotConstructible { kind: String, variant: String },

    #[error("Probe for '{kind}' violates its contract: {reason}")]
    MalformedProbe { kind: String, reason: String },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Corrupt structure: {0}")]
    Corrupt(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl RelicError {
    pub fn out_of_range(index: impl TryInto<u64>, limit: impl TryInto<u64>) -> Self {
        RelicError::OutOfRange {
            index: index.try_into().unwrap_or(u64::MAX),
            limit: limit.try_into().unwrap_or(u64::MAX),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelicError>;
