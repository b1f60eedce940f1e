use crate::types::Platform;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures raised by the platform fetch adapters.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("{platform} credentials missing: set {var_name}")]
    MissingCredentials {
        platform: Platform,
        var_name: String,
    },

    #[error("{platform} rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { platform: Platform, retry_after: u64 },

    #[error("{platform} rejected the credentials")]
    Unauthorized { platform: Platform },

    #[error("{platform} forbade access to {resource}")]
    Forbidden { platform: Platform, resource: String },

    #[error("{platform} resource not found: {resource}")]
    NotFound { platform: Platform, resource: String },

    #[error("{platform} request timeout")]
    RequestTimeout { platform: Platform },

    #[error("Invalid {platform} response: {details}")]
    InvalidResponse { platform: Platform, details: String },

    #[error("{platform} server error: {status_code}")]
    ServerError { platform: Platform, status_code: u16 },

    #[error("{platform} circuit breaker is open")]
    CircuitOpen { platform: Platform },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Query execution failed: {query}")]
    QueryFailed { query: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Corrupt row in {table}: {details}")]
    CorruptRow { table: String, details: String },

    #[error("Database not connected")]
    NotConnected,

    #[error("Database locked")]
    DatabaseLocked,

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API key invalid or missing for {provider}")]
    InvalidApiKey { provider: String },

    #[error("Rate limit exceeded for {provider}. Retry after {retry_after} seconds")]
    RateLimitExceeded { provider: String, retry_after: u64 },

    #[error("Model not available: {model}")]
    ModelNotAvailable { model: String },

    #[error("Content filtered by provider: {reason}")]
    ContentFiltered { reason: String },

    #[error("Provider service unavailable: {provider}")]
    ServiceUnavailable { provider: String },

    #[error("Request timeout for {provider}")]
    RequestTimeout { provider: String },

    #[error("Invalid response format from {provider}: {details}")]
    InvalidResponseFormat { provider: String, details: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, value: impl ToString) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
        }
    }
}
