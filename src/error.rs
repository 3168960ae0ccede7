//! Error types for Sprout.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Garden error: {0}")]
    Garden(#[from] GardenError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Concurrent modification of {entity} {id}")]
    Conflict { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("LibSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} server error (HTTP {status}): {reason}")]
    ServerError {
        provider: String,
        status: u16,
        reason: String,
    },

    #[error("Provider {provider} rejected the request (HTTP {status}): {reason}")]
    Rejected {
        provider: String,
        status: u16,
        reason: String,
    },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Model {model} not available on provider {provider}")]
    ModelNotAvailable { provider: String, model: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the habit classifier capability.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Model did not call the {tool} function")]
    MissingCall { tool: String },

    #[error("Classifier returned invalid output: {reason}")]
    InvalidOutput { reason: String },

    #[error("Classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("Classifier output was recovered from free text and recovered output is disabled")]
    RecoveredRejected,
}

impl ClassifierError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Llm(err) => matches!(
                err,
                LlmError::RateLimited { .. }
                    | LlmError::ServerError { .. }
                    | LlmError::RequestFailed { .. }
                    | LlmError::Http(_)
            ),
            Self::MissingCall { .. } | Self::InvalidOutput { .. } | Self::RecoveredRejected => {
                false
            }
        }
    }

    /// Server-suggested delay before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Llm(LlmError::RateLimited { retry_after, .. }) => *retry_after,
            _ => None,
        }
    }
}

/// Rejected user input.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

/// Errors surfaced by garden operations.
#[derive(Debug, thiserror::Error)]
pub enum GardenError {
    #[error("Garden not initialized for user {user_id}")]
    NotInitialized { user_id: String },

    #[error("Garden already exists for user {user_id}")]
    AlreadyExists { user_id: String },

    #[error("Classifier failure: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Validation failure: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// HTTP gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Server error: {0}")]
    Serve(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
