//! Error taxonomy tests: transience classification, retry-after
//! extraction, and kind mapping.

use std::time::Duration;

use muninn::{ErrorKind, MuninnError};

// ============================================================================
// Transience classification
// ============================================================================

#[test]
fn transport_errors_are_transient() {
    assert!(MuninnError::Http("connection reset".into()).is_transient());
}

#[test]
fn server_errors_are_transient() {
    assert!(MuninnError::Api {
        status: 500,
        message: "internal".into()
    }
    .is_transient());
    assert!(MuninnError::Api {
        status: 503,
        message: "overloaded".into()
    }
    .is_transient());
}

#[test]
fn rate_limits_are_transient() {
    assert!(MuninnError::RateLimited { retry_after: None }.is_transient());
}

#[test]
fn client_errors_are_permanent() {
    assert!(!MuninnError::Api {
        status: 400,
        message: "bad request".into()
    }
    .is_transient());
    assert!(!MuninnError::AuthenticationFailed.is_transient());
    assert!(!MuninnError::ModelNotFound("gpt-5-ultra".into()).is_transient());
}

#[test]
fn local_errors_are_permanent() {
    assert!(!MuninnError::Parse("bad json".into()).is_transient());
    assert!(!MuninnError::InvalidRequest("empty prompt".into()).is_transient());
    assert!(!MuninnError::Timeout {
        elapsed: Duration::from_secs(30)
    }
    .is_transient());
    assert!(!MuninnError::QueueFull { capacity: 10 }.is_transient());
}

// ============================================================================
// retry_after extraction
// ============================================================================

#[test]
fn retry_after_from_rate_limited() {
    let duration = Duration::from_secs(5);
    let err = MuninnError::RateLimited {
        retry_after: Some(duration),
    };
    assert_eq!(err.retry_after(), Some(duration));
}

#[test]
fn retry_after_none_when_not_specified() {
    assert_eq!(MuninnError::RateLimited { retry_after: None }.retry_after(), None);
}

#[test]
fn retry_after_none_for_other_errors() {
    assert_eq!(MuninnError::Http("timeout".into()).retry_after(), None);
    assert_eq!(MuninnError::AuthenticationFailed.retry_after(), None);
}

// ============================================================================
// Kind mapping
// ============================================================================

#[test]
fn kinds_match_the_contract() {
    assert_eq!(
        MuninnError::QueueFull { capacity: 1 }.kind(),
        ErrorKind::QueueFull
    );
    assert_eq!(
        MuninnError::Timeout {
            elapsed: Duration::ZERO
        }
        .kind(),
        ErrorKind::Timeout
    );
    assert_eq!(
        MuninnError::Http("reset".into()).kind(),
        ErrorKind::ProviderTransient
    );
    assert_eq!(
        MuninnError::Api {
            status: 502,
            message: String::new()
        }
        .kind(),
        ErrorKind::ProviderTransient
    );
    assert_eq!(
        MuninnError::RateLimited { retry_after: None }.kind(),
        ErrorKind::ProviderRateLimited
    );
    assert_eq!(
        MuninnError::Api {
            status: 422,
            message: String::new()
        }
        .kind(),
        ErrorKind::ProviderFatal
    );
    assert_eq!(MuninnError::AuthenticationFailed.kind(), ErrorKind::ProviderFatal);
    assert_eq!(
        MuninnError::Parse("nope".into()).kind(),
        ErrorKind::ParseError
    );
    assert_eq!(
        MuninnError::InvalidRequest("empty".into()).kind(),
        ErrorKind::ConfigError
    );
}

#[test]
fn retry_eligibility_is_exactly_transient_and_rate_limited() {
    let retryable = [
        ErrorKind::ProviderTransient,
        ErrorKind::ProviderRateLimited,
    ];
    let samples: Vec<MuninnError> = vec![
        MuninnError::QueueFull { capacity: 1 },
        MuninnError::Timeout {
            elapsed: Duration::ZERO,
        },
        MuninnError::Http("reset".into()),
        MuninnError::RateLimited { retry_after: None },
        MuninnError::AuthenticationFailed,
        MuninnError::Parse("nope".into()),
        MuninnError::InvalidRequest("empty".into()),
    ];

    for err in samples {
        assert_eq!(
            err.is_transient(),
            retryable.contains(&err.kind()),
            "transience disagrees with kind for {err:?}"
        );
    }
}
