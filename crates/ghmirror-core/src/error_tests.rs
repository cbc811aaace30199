//! Tests for the error taxonomy and its retry/category mapping.

use super::*;

#[test]
fn test_transient_errors() {
    assert!(MirrorError::UpstreamUnavailable {
        status: Some(502),
        message: "bad gateway".to_string()
    }
    .is_transient());
    assert!(MirrorError::UpstreamRateLimited {
        retry_after: Some(Duration::from_secs(30))
    }
    .is_transient());
    assert!(MirrorError::Store(StoreError::Unavailable {
        message: "down".to_string()
    })
    .is_transient());
}

#[test]
fn test_deterministic_failures_are_permanent() {
    assert!(!MirrorError::MalformedPayload {
        message: "bad json".to_string()
    }
    .is_transient());
    assert!(!MirrorError::Conflict {
        entity: "pull_request",
        key: "12345/5".to_string()
    }
    .is_transient());
    assert!(!MirrorError::UnknownEvent {
        event_name: "sponsorship".to_string(),
        action: None
    }
    .is_transient());
}

#[test]
fn test_signature_failure_is_security_category() {
    let err = MirrorError::SignatureInvalid {
        delivery_id: "d-1".to_string(),
    };
    assert_eq!(err.category(), ErrorCategory::Security);
    assert!(!err.is_transient());
}

#[test]
fn test_retry_after_hint_propagates() {
    let err = MirrorError::UpstreamRateLimited {
        retry_after: Some(Duration::from_secs(17)),
    };
    assert_eq!(err.retry_after(), Some(Duration::from_secs(17)));
    assert_eq!(
        MirrorError::MalformedPayload {
            message: String::new()
        }
        .retry_after(),
        None
    );
}

#[test]
fn test_api_error_mapping() {
    let err: MirrorError = ApiError::RateLimited {
        retry_after: Some(Duration::from_secs(5)),
    }
    .into();
    assert!(matches!(err, MirrorError::UpstreamRateLimited { .. }));

    let err: MirrorError = ApiError::Upstream {
        status: 503,
        message: "unavailable".to_string(),
    }
    .into();
    assert!(matches!(
        err,
        MirrorError::UpstreamUnavailable {
            status: Some(503),
            ..
        }
    ));

    let err: MirrorError = ApiError::Rejected {
        status: 422,
        message: "validation".to_string(),
    }
    .into();
    assert!(!err.is_transient());
}

#[test]
fn test_unknown_event_display_includes_action() {
    let err = MirrorError::UnknownEvent {
        event_name: "issues".to_string(),
        action: Some("milestoned".to_string()),
    };
    assert!(err.to_string().contains("issues/milestoned"));
}
