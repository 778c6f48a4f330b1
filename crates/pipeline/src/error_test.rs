//! Error classification tests

use std::time::Duration;

use tally_channel::{ChannelError, DeliveryToken};
use tally_sinks::SinkError;
use tally_transform::TransformError;

use super::{ErrorClass, StageError};

#[test]
fn test_channel_errors_classified() {
    assert_eq!(
        StageError::from(ChannelError::Closed).class(),
        ErrorClass::ChannelClosed
    );
    assert_eq!(
        StageError::from(ChannelError::Draining).class(),
        ErrorClass::ChannelClosed
    );
    assert_eq!(
        StageError::from(ChannelError::timeout("enqueue", Duration::from_secs(1))).class(),
        ErrorClass::TransientIo
    );
    assert_eq!(
        StageError::from(ChannelError::Full).class(),
        ErrorClass::TransientIo
    );
    assert_eq!(
        StageError::from(ChannelError::UnknownDelivery(DeliveryToken::new(1, 1))).class(),
        ErrorClass::TransientIo
    );
}

#[test]
fn test_transform_errors_classified() {
    let err = StageError::from(TransformError::invalid("user1", "negative duration"));
    assert_eq!(err.class(), ErrorClass::Validation);
    assert!(err.message().contains("negative duration"));

    let err = StageError::from(TransformError::failed("rate service down"));
    assert_eq!(err.class(), ErrorClass::TransientIo);
}

#[test]
fn test_sink_errors_are_transient() {
    let err = StageError::from(SinkError::write("disk full"));
    assert_eq!(err.class(), ErrorClass::TransientIo);
    assert!(err.class().is_retriable());
}

#[test]
fn test_display() {
    let err = StageError::transient("processing timeout");
    assert_eq!(err.to_string(), "transient_io: processing timeout");
    assert_eq!(ErrorClass::Validation.to_string(), "validation");
    assert!(!ErrorClass::Validation.is_retriable());
    assert!(!ErrorClass::ChannelClosed.is_retriable());
}
