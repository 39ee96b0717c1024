//! Tests for error classification

use gang_controller::core::{AppResult, ControllerError, GroupKey};

#[test]
fn test_retryable_errors() {
    let conflict = ControllerError::Conflict {
        key: "default/pg".into(),
        expected: 1,
        actual: 2,
    };
    assert!(conflict.is_retryable());
    assert!(ControllerError::StoreUnavailable("down".into()).is_retryable());
}

#[test]
fn test_permanent_errors() {
    assert!(!ControllerError::NotFound("default/pg".into()).is_retryable());
    assert!(!ControllerError::InvalidConfig("bad".into()).is_retryable());
    assert!(!ControllerError::Internal("boom".into()).is_retryable());
}

#[test]
fn test_error_display() {
    let err = ControllerError::Conflict {
        key: "default/pg".into(),
        expected: 3,
        actual: 4,
    };
    assert_eq!(
        err.to_string(),
        "conflict on default/pg: expected version 3, found 4"
    );
    assert_eq!(
        ControllerError::NotFound("default/pg".into()).to_string(),
        "not found: default/pg"
    );
}

#[test]
fn test_io_error_maps_to_internal() {
    let err: ControllerError = std::io::Error::other("spawn failed").into();
    assert!(matches!(err, ControllerError::Internal(_)));
}

#[test]
fn test_app_result_wraps_controller_error() {
    fn load(raw: &str) -> AppResult<GroupKey> {
        Ok(GroupKey::parse(raw)?)
    }

    assert_eq!(load("default/pg").unwrap(), GroupKey::new("default", "pg"));
    let err = load("nope").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ControllerError>(),
        Some(ControllerError::InvalidConfig(_))
    ));
}
