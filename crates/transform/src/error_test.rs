//! Tests for transform error types

use super::*;

#[test]
fn test_error_creation() {
    let err = TransformError::invalid("user1", "duration is negative");
    assert!(matches!(err, TransformError::InvalidUsageDetail { .. }));
    assert!(err.is_validation());

    let err = TransformError::failed("rate lookup failed");
    assert!(matches!(err, TransformError::TransformFailed(_)));
    assert!(!err.is_validation());

    let err = TransformError::config("negative rate");
    assert!(matches!(err, TransformError::Config(_)));
}

#[test]
fn test_error_display() {
    let err = TransformError::invalid("user3", "data is negative (-1)");
    assert_eq!(
        err.to_string(),
        "invalid usage detail for 'user3': data is negative (-1)"
    );

    let err = TransformError::failed("logic error");
    assert_eq!(err.to_string(), "transform failed: logic error");

    let err = TransformError::config("rate_per_unit must be >= 0");
    assert_eq!(
        err.to_string(),
        "invalid configuration: rate_per_unit must be >= 0"
    );
}
