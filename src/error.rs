use thiserror::Error;

/// Main error type for the lifecycle service
#[derive(Error, Debug)]
pub enum RentchainError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Chain transport errors (RPC unavailable, malformed response)
    #[error("Chain provider error: {0}")]
    Chain(String),

    // Lifecycle errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Signer failure: {0}")]
    SignerFailure(String),

    #[error("Chain rejected transaction: {0}")]
    ChainRejected(String),

    #[error("Confirmation timeout after {elapsed_secs}s")]
    ConfirmationTimeout { elapsed_secs: u64 },

    #[error("Aggregation failure: {0}")]
    AggregationFailure(String),

    // Queue errors
    #[error("Broadcast queue halted: {0}")]
    QueueHalted(String),

    #[error("Nonce rejected by chain: {0}")]
    NonceDesync(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RentchainError {
    /// Stable machine-readable kind, used in API error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Database(_) | Self::Migration(_) => "database",
            Self::Chain(_) => "chain_unavailable",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::SignerFailure(_) => "signer_failure",
            Self::ChainRejected(_) => "chain_rejected",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::AggregationFailure(_) => "aggregation_failure",
            Self::QueueHalted(_) => "queue_halted",
            Self::NonceDesync(_) => "nonce_desync",
            Self::Json(_) => "serialization",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Io(_) => "io",
            Self::Internal(_) | Self::Other(_) => "internal",
        }
    }
}

/// Result type alias for RentchainError
pub type Result<T> = std::result::Result<T, RentchainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_for_lifecycle_errors() {
        let err = RentchainError::InvalidStateTransition {
            from: "terminated".to_string(),
            to: "occupied".to_string(),
        };
        assert_eq!(err.kind(), "invalid_state_transition");

        assert_eq!(
            RentchainError::ChainRejected("agreement already active".into()).kind(),
            "chain_rejected"
        );
        assert_eq!(
            RentchainError::ConfirmationTimeout { elapsed_secs: 30 }.kind(),
            "confirmation_timeout"
        );
    }

    #[test]
    fn display_includes_transition_endpoints() {
        let err = RentchainError::InvalidStateTransition {
            from: "draft".to_string(),
            to: "occupied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition: from draft to occupied"
        );
    }
}
