//! Tests for common sink types

use crate::{SinkError, SinkMetrics};

#[test]
fn test_metrics_new() {
    let snapshot = SinkMetrics::new().snapshot();

    assert_eq!(snapshot.records_written, 0);
    assert_eq!(snapshot.bytes_written, 0);
    assert_eq!(snapshot.write_errors, 0);
    assert_eq!(snapshot.flush_count, 0);
}

#[test]
fn test_metrics_tracking() {
    let metrics = SinkMetrics::new();

    metrics.record_written(40);
    metrics.record_written(42);
    metrics.write_error();
    metrics.flush();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.records_written, 2);
    assert_eq!(snapshot.bytes_written, 82);
    assert_eq!(snapshot.write_errors, 1);
    assert_eq!(snapshot.flush_count, 1);
}

#[test]
fn test_error_display() {
    assert_eq!(
        SinkError::init("no such dir").to_string(),
        "failed to initialize sink: no such dir"
    );
    assert_eq!(
        SinkError::write("disk full").to_string(),
        "write failed: disk full"
    );

    let err = SinkError::Corrupt {
        line: 3,
        reason: "expected value".into(),
    };
    assert!(err.to_string().contains("line 3"));
}

#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: SinkError = io_err.into();
    assert!(matches!(err, SinkError::Io(_)));
}
