//! Classification and uniform logging of the error taxonomy.

use crate::error::*;
use std::fmt::Display;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait ErrorExt: Display {
    /// Stable, grep-able identifier such as `SOURCE_RATE_LIMIT`.
    fn error_code(&self) -> &'static str;

    fn user_friendly_message(&self) -> String;

    fn is_retryable(&self) -> bool {
        false
    }

    /// How long to wait before retrying, for retryable errors only.
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn log_error(&self) -> &Self
    where
        Self: Sized,
    {
        error!("[{}] {}", self.error_code(), self);
        self
    }

    fn log_warn(&self) -> &Self
    where
        Self: Sized,
    {
        warn!("[{}] {}", self.error_code(), self);
        self
    }
}

impl ErrorExt for CoreError {
    fn error_code(&self) -> &'static str {
        match self {
            CoreError::Source(e) => e.error_code(),
            CoreError::Database(e) => e.error_code(),
            CoreError::Llm(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
            CoreError::Network(_) => "NETWORK",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::Timeout { .. } => "TIMEOUT",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Internal { .. } => "INTERNAL",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::Source(e) => e.user_friendly_message(),
            CoreError::Database(e) => e.user_friendly_message(),
            CoreError::Llm(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Io(e) => format!("File system error: {e}"),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { message } => format!("Invalid input: {message}"),
            CoreError::Timeout { seconds } => {
                format!("The operation gave up after {seconds} seconds. Please try again.")
            }
            CoreError::NotFound { resource } => format!("Could not find: {resource}"),
            CoreError::Serialization(_) | CoreError::Internal { .. } => {
                "An unexpected error occurred. Run with --verbose for details.".to_string()
            }
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Source(e) => e.is_retryable(),
            CoreError::Database(e) => e.is_retryable(),
            CoreError::Llm(e) => e.is_retryable(),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::Source(e) => e.retry_after(),
            CoreError::Database(e) => e.retry_after(),
            CoreError::Llm(e) => e.retry_after(),
            CoreError::Timeout { seconds } => Some(Duration::from_secs(*seconds)),
            _ if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }
}

impl ErrorExt for SourceError {
    fn error_code(&self) -> &'static str {
        match self {
            SourceError::MissingCredentials { .. } => "SOURCE_MISSING_CREDENTIALS",
            SourceError::RateLimitExceeded { .. } => "SOURCE_RATE_LIMIT",
            SourceError::Unauthorized { .. } => "SOURCE_UNAUTHORIZED",
            SourceError::Forbidden { .. } => "SOURCE_FORBIDDEN",
            SourceError::NotFound { .. } => "SOURCE_NOT_FOUND",
            SourceError::RequestTimeout { .. } => "SOURCE_TIMEOUT",
            SourceError::InvalidResponse { .. } => "SOURCE_INVALID_RESPONSE",
            SourceError::ServerError { .. } => "SOURCE_SERVER_ERROR",
            SourceError::CircuitOpen { .. } => "SOURCE_CIRCUIT_OPEN",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            SourceError::MissingCredentials { platform, var_name } => format!(
                "{} needs credentials. Set the {} environment variable.",
                platform.display_name(),
                var_name
            ),
            SourceError::RateLimitExceeded {
                platform,
                retry_after,
            } => format!(
                "{} is rate limiting us. Wait {} seconds before searching again.",
                platform.display_name(),
                retry_after
            ),
            SourceError::Unauthorized { platform } => format!(
                "{} rejected the configured token. Please check your credentials.",
                platform.display_name()
            ),
            SourceError::Forbidden { platform, resource } => {
                format!("{} refused access to {}.", platform.display_name(), resource)
            }
            SourceError::CircuitOpen { platform } => format!(
                "{} kept failing and is paused for this run.",
                platform.display_name()
            ),
            other => format!("Fetching failed: {other}"),
        }
    }

    /// Malformed payloads are not retried; the same query returns the same body.
    fn is_retryable(&self) -> bool {
        match self {
            SourceError::RateLimitExceeded { .. } | SourceError::RequestTimeout { .. } => true,
            SourceError::ServerError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SourceError::RateLimitExceeded { retry_after, .. } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(2)),
            _ => None,
        }
    }
}

impl ErrorExt for DatabaseError {
    fn error_code(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED",
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED",
            DatabaseError::QueryFailed { .. } => "DB_QUERY_FAILED",
            DatabaseError::TransactionFailed { .. } => "DB_TRANSACTION_FAILED",
            DatabaseError::CorruptRow { .. } => "DB_CORRUPT_ROW",
            DatabaseError::NotConnected => "DB_NOT_CONNECTED",
            DatabaseError::DatabaseLocked => "DB_LOCKED",
            DatabaseError::Sql(_) => "DB_SQL_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { reason } => {
                format!("Could not open the database: {reason}")
            }
            DatabaseError::MigrationFailed { .. } => {
                "The database schema could not be upgraded.".to_string()
            }
            DatabaseError::DatabaseLocked => {
                "Database is busy with another run for this topic. Please try again.".to_string()
            }
            DatabaseError::CorruptRow { table, .. } => {
                format!("Stored data in '{table}' could not be read.")
            }
            _ => "Database error occurred. Please try again.".to_string(),
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::DatabaseLocked | DatabaseError::TransactionFailed { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            DatabaseError::DatabaseLocked => Some(Duration::from_millis(100)),
            _ if self.is_retryable() => Some(Duration::from_secs(1)),
            _ => None,
        }
    }
}

impl ErrorExt for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            LlmError::InvalidApiKey { .. } => "LLM_INVALID_API_KEY",
            LlmError::RateLimitExceeded { .. } => "LLM_RATE_LIMIT",
            LlmError::ModelNotAvailable { .. } => "LLM_MODEL_NOT_AVAILABLE",
            LlmError::ContentFiltered { .. } => "LLM_CONTENT_FILTERED",
            LlmError::ServiceUnavailable { .. } => "LLM_SERVICE_UNAVAILABLE",
            LlmError::RequestTimeout { .. } => "LLM_TIMEOUT",
            LlmError::InvalidResponseFormat { .. } => "LLM_INVALID_RESPONSE",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LlmError::InvalidApiKey { provider } => {
                format!("{provider} rejected the API key. Check GEMINI_API_KEY.")
            }
            LlmError::RateLimitExceeded {
                provider,
                retry_after,
            } => format!("{provider} quota exhausted. Wait {retry_after} seconds and run analyze."),
            LlmError::ModelNotAvailable { model } => {
                format!("Model '{model}' is not available. Set llm.model to another model.")
            }
            LlmError::ContentFiltered { .. } => {
                "The provider's safety filter blocked this batch.".to_string()
            }
            other => format!("Extraction failed: {other}"),
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimitExceeded { .. }
                | LlmError::ServiceUnavailable { .. }
                | LlmError::RequestTimeout { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimitExceeded { retry_after, .. } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(10)),
            _ => None,
        }
    }
}

/// Configuration problems are fatal at startup and never retried.
impl ErrorExt for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR",
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED",
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => format!("Configuration file '{path}' not found."),
            ConfigError::InvalidValue { field, value } => {
                format!("Invalid value '{value}' for '{field}' in the configuration.")
            }
            ConfigError::MissingEnvironmentVariable { var_name } => {
                format!("Set the {var_name} environment variable first.")
            }
            ConfigError::ValidationFailed { reason } => {
                format!("Configuration is inconsistent: {reason}")
            }
            ConfigError::Parse(e) => format!("Configuration file is not valid TOML: {e}"),
        }
    }
}

/// Logs errors the same way wherever a run decides to carry on past them.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if !self.report_errors {
            return;
        }
        error.log_error();
        info!("{}", error.user_friendly_message());
        if let Some(wait) = error.retry_after() {
            info!("Retryable after {:?}", wait);
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
