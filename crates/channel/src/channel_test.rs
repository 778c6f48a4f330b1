//! Channel tests
//!
//! Ordering, capacity, acknowledgement and lifecycle. Timing-sensitive tests
//! run on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use crate::{Channel, ChannelConfig, ChannelError, ChannelState, Queue};

fn channel(capacity: usize) -> Channel<u32> {
    Channel::new("test", ChannelConfig::with_capacity(capacity))
}

fn channel_with_visibility(capacity: usize, visibility: Duration) -> Channel<u32> {
    Channel::new(
        "test",
        ChannelConfig::with_capacity(capacity).with_visibility_timeout(visibility),
    )
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_fifo_order() {
    let ch = channel(10);
    for i in 0..5 {
        ch.try_enqueue(i).unwrap();
    }

    for expected in 0..5 {
        let d = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
        assert_eq!(*d.payload(), expected);
        assert_eq!(d.attempt(), 1);
        assert!(!d.is_redelivery());
        ch.ack(d.token()).unwrap();
    }

    assert!(ch.is_empty());
}

#[tokio::test]
async fn test_nack_without_delay_keeps_position() {
    let ch = channel(10);
    ch.try_enqueue(1).unwrap();
    ch.try_enqueue(2).unwrap();

    let first = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    assert_eq!(*first.payload(), 1);
    ch.nack(first.token(), Duration::ZERO).unwrap();

    let again = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    assert_eq!(*again.payload(), 1);
    assert_eq!(again.attempt(), 2);
    assert!(again.is_redelivery());
}

#[tokio::test(start_paused = true)]
async fn test_nack_with_delay_lets_later_messages_through() {
    let ch = channel(10);
    ch.try_enqueue(1).unwrap();
    ch.try_enqueue(2).unwrap();

    let first = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    ch.nack(first.token(), Duration::from_secs(1)).unwrap();

    let second = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    assert_eq!(*second.payload(), 2);
    ch.ack(second.token()).unwrap();

    // Hidden until the delay passes
    let err = ch
        .dequeue_timeout(Duration::from_millis(500))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Timeout { op: "dequeue", .. }));

    let retried = ch.dequeue_timeout(Duration::from_secs(5)).await.unwrap();
    assert_eq!(*retried.payload(), 1);
    assert_eq!(retried.attempt(), 2);

    let snap = ch.snapshot();
    assert_eq!(snap.nacked, 1);
    // Nacked messages coming back are not visibility timeouts
    assert_eq!(snap.redelivered, 0);
}

// ============================================================================
// Capacity
// ============================================================================

#[tokio::test]
async fn test_try_enqueue_full() {
    let ch = channel(2);
    ch.try_enqueue(1).unwrap();
    ch.try_enqueue(2).unwrap();

    assert!(matches!(ch.try_enqueue(3), Err(ChannelError::Full)));
    assert_eq!(ch.snapshot().rejected, 1);
}

#[tokio::test]
async fn test_in_flight_counts_against_capacity() {
    let ch = channel(2);
    ch.try_enqueue(1).unwrap();
    ch.try_enqueue(2).unwrap();

    let d = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    assert_eq!(ch.len(), 1);
    assert_eq!(ch.in_flight(), 1);
    assert!(matches!(ch.try_enqueue(3), Err(ChannelError::Full)));

    ch.ack(d.token()).unwrap();
    ch.try_enqueue(3).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_timeout_when_full() {
    let ch = channel(1);
    ch.try_enqueue(1).unwrap();

    let err = ch
        .enqueue_timeout(2, Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Timeout { op: "enqueue", .. }));
    assert!(err.is_retriable());
}

#[tokio::test(start_paused = true)]
async fn test_blocked_enqueue_resumes_after_ack() {
    let ch = Arc::new(channel(1));
    ch.try_enqueue(1).unwrap();

    let producer = {
        let ch = Arc::clone(&ch);
        tokio::spawn(async move { ch.enqueue_timeout(2, Duration::from_secs(5)).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let d = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    ch.ack(d.token()).unwrap();

    producer.await.unwrap().unwrap();
    let d = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    assert_eq!(*d.payload(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dequeue_timeout_when_empty() {
    let ch = channel(4);
    let err = ch
        .dequeue_timeout(Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Timeout { op: "dequeue", .. }));
}

#[tokio::test(start_paused = true)]
async fn test_blocked_dequeue_wakes_on_enqueue() {
    let ch = Arc::new(channel(4));

    let consumer = {
        let ch = Arc::clone(&ch);
        tokio::spawn(async move { ch.dequeue_timeout(Duration::from_secs(5)).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    ch.try_enqueue(7).unwrap();

    let d = consumer.await.unwrap().unwrap();
    assert_eq!(*d.payload(), 7);
}

// ============================================================================
// Acknowledgement
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_redelivery_after_visibility_timeout() {
    let ch = channel_with_visibility(4, Duration::from_secs(1));
    ch.try_enqueue(42).unwrap();

    let first = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    assert_eq!(first.attempt(), 1);

    // Not before the visibility timeout
    let err = ch
        .dequeue_timeout(Duration::from_millis(500))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Timeout { .. }));

    let second = ch.dequeue_timeout(Duration::from_secs(2)).await.unwrap();
    assert_eq!(*second.payload(), 42);
    assert_eq!(second.attempt(), 2);
    assert_eq!(ch.snapshot().redelivered, 1);

    // The first lease is superseded
    assert!(matches!(
        ch.ack(first.token()),
        Err(ChannelError::UnknownDelivery(_))
    ));
    ch.ack(second.token()).unwrap();
    assert!(ch.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_redelivered_message_goes_before_newer_ones() {
    let ch = channel_with_visibility(4, Duration::from_secs(1));
    ch.try_enqueue(1).unwrap();
    let _lost = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    ch.try_enqueue(2).unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;

    let d = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    assert_eq!(*d.payload(), 1);
    assert_eq!(d.attempt(), 2);
}

#[tokio::test]
async fn test_double_ack_is_unknown() {
    let ch = channel(4);
    ch.try_enqueue(1).unwrap();
    let d = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();

    ch.ack(d.token()).unwrap();
    let err = ch.ack(d.token()).unwrap_err();
    assert!(matches!(err, ChannelError::UnknownDelivery(t) if t == d.token()));
    assert_eq!(ch.snapshot().acked, 1);
}

#[tokio::test]
async fn test_nack_makes_token_stale() {
    let ch = channel(4);
    ch.try_enqueue(1).unwrap();
    let d = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();

    ch.nack(d.token(), Duration::from_secs(10)).unwrap();
    assert!(matches!(
        ch.ack(d.token()),
        Err(ChannelError::UnknownDelivery(_))
    ));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_drain_refuses_new_and_serves_remaining() {
    let ch = channel(4);
    ch.try_enqueue(1).unwrap();
    ch.try_enqueue(2).unwrap();

    ch.drain();
    assert_eq!(ch.state(), ChannelState::Draining);
    assert!(matches!(ch.try_enqueue(3), Err(ChannelError::Draining)));

    let a = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    let b = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    ch.ack(a.token()).unwrap();
    assert_eq!(ch.state(), ChannelState::Draining);
    ch.ack(b.token()).unwrap();

    assert_eq!(ch.state(), ChannelState::Closed);
    let err = ch
        .dequeue_timeout(Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(err.is_closed());
}

#[tokio::test]
async fn test_drain_empty_closes_immediately() {
    let ch = channel(4);
    ch.drain();
    assert_eq!(ch.state(), ChannelState::Closed);
    assert!(matches!(ch.try_enqueue(1), Err(ChannelError::Closed)));
}

#[tokio::test]
async fn test_close_reports_discarded() {
    let ch = channel(4);
    ch.try_enqueue(1).unwrap();
    ch.try_enqueue(2).unwrap();
    ch.try_enqueue(3).unwrap();
    let d = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();

    assert_eq!(ch.close(), 3);
    assert_eq!(ch.state(), ChannelState::Closed);
    assert!(matches!(ch.ack(d.token()), Err(ChannelError::Closed)));
    assert_eq!(ch.close(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_closed_resolves_after_drain() {
    let ch = Arc::new(channel(4));
    ch.try_enqueue(1).unwrap();

    let waiter = {
        let ch = Arc::clone(&ch);
        tokio::spawn(async move { ch.closed().await })
    };

    ch.drain();
    let d = ch.dequeue_timeout(Duration::from_millis(10)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());

    ch.ack(d.token()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
}

// ============================================================================
// Queue trait
// ============================================================================

#[tokio::test]
async fn test_channel_as_dyn_queue() {
    let queue: Arc<dyn Queue<u32>> = Arc::new(channel(4));
    queue.enqueue(5).await.unwrap();

    let d = queue.dequeue().await.unwrap();
    assert_eq!(*d.payload(), 5);
    queue.ack(d.token()).unwrap();

    let snap = queue.snapshot();
    assert_eq!(snap.enqueued, 1);
    assert_eq!(snap.acked, 1);
    assert_eq!(snap.outstanding(), 0);
    assert_eq!(queue.name(), "test");
}
