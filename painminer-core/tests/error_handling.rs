use painminer_core::{
    ConfigError, CoreError, DatabaseError, ErrorExt, ErrorReporter, LlmError, Platform,
    SourceError,
};
use std::time::Duration;

#[test]
fn test_error_codes_come_from_the_wrapped_error() {
    let source_error = CoreError::Source(SourceError::Unauthorized {
        platform: Platform::X,
    });
    assert_eq!(source_error.error_code(), "SOURCE_UNAUTHORIZED");

    let db_error = CoreError::Database(DatabaseError::DatabaseLocked);
    assert_eq!(db_error.error_code(), "DB_LOCKED");

    let llm_error = CoreError::Llm(LlmError::InvalidApiKey {
        provider: "gemini".to_string(),
    });
    assert_eq!(llm_error.error_code(), "LLM_INVALID_API_KEY");

    let config_error = CoreError::Config(ConfigError::invalid(
        "aggregation.similarity_threshold",
        1.5,
    ));
    assert_eq!(config_error.error_code(), "CONFIG_INVALID_VALUE");

    let missing = CoreError::NotFound {
        resource: "output/2024-03-01-invoicing.md".to_string(),
    };
    assert_eq!(missing.error_code(), "NOT_FOUND");
}

#[test]
fn test_retryable_errors() {
    let rate_limited = CoreError::Source(SourceError::RateLimitExceeded {
        platform: Platform::Reddit,
        retry_after: 60,
    });
    assert!(rate_limited.is_retryable());

    let server_error = CoreError::Source(SourceError::ServerError {
        platform: Platform::Hn,
        status_code: 502,
    });
    assert!(server_error.is_retryable());

    let bad_payload = CoreError::Source(SourceError::InvalidResponse {
        platform: Platform::ProductHunt,
        details: "expected value at line 1".to_string(),
    });
    assert!(!bad_payload.is_retryable());

    let config = CoreError::Config(ConfigError::ValidationFailed {
        reason: "weights".to_string(),
    });
    assert!(!config.is_retryable());
    assert_eq!(config.retry_after(), None);

    let missing_token = CoreError::Source(SourceError::MissingCredentials {
        platform: Platform::ProductHunt,
        var_name: "PRODUCTHUNT_TOKEN".to_string(),
    });
    assert!(!missing_token.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limited = CoreError::Source(SourceError::RateLimitExceeded {
        platform: Platform::Reddit,
        retry_after: 60,
    });
    assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

    let timeout = CoreError::Timeout { seconds: 30 };
    assert_eq!(timeout.retry_after(), Some(Duration::from_secs(30)));

    let locked = CoreError::Database(DatabaseError::DatabaseLocked);
    assert_eq!(locked.retry_after(), Some(Duration::from_millis(100)));

    let quota = CoreError::Llm(LlmError::RateLimitExceeded {
        provider: "gemini".to_string(),
        retry_after: 12,
    });
    assert_eq!(quota.retry_after(), Some(Duration::from_secs(12)));
}

#[test]
fn test_user_friendly_messages() {
    let source_error = CoreError::Source(SourceError::MissingCredentials {
        platform: Platform::X,
        var_name: "X_BEARER_TOKEN".to_string(),
    });
    let message = source_error.user_friendly_message();
    assert!(message.contains("X_BEARER_TOKEN"));
    assert!(message.contains("X/Twitter"));

    let config_error = CoreError::Config(ConfigError::invalid("scoring.weights.pain", -1));
    assert!(config_error
        .user_friendly_message()
        .contains("scoring.weights.pain"));

    let no_key = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "GEMINI_API_KEY".to_string(),
    });
    assert!(no_key.user_friendly_message().contains("GEMINI_API_KEY"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(false)
        .with_warning_reporting(true);
    let error = CoreError::Source(SourceError::RequestTimeout {
        platform: Platform::Hn,
    });

    // Reporting only logs; it must never panic or consume the error.
    reporter.report_error(&error);
    reporter.report_warning(&error);
    assert_eq!(error.error_code(), "SOURCE_TIMEOUT");
}
