use thiserror::Error;

use crate::codec::CodecError;

/// Main error type for the ledger service
#[derive(Error, Debug)]
pub enum LedgerError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store unavailable after {attempts} attempts: {last_error}")]
    StoreUnavailable { attempts: u32, last_error: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    // Payload errors
    #[error("Array codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Model errors
    #[error("Model error: {0}")]
    Model(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }
}

/// Result type alias for LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;
