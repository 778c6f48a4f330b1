//! Transport tests
//!
//! In-process broker behaviour and the typed queue on top of it.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tally_protocol::{UsageCostDetail, UsageDetail, encode};

use super::*;
use crate::{ChannelConfig, ChannelError, ChannelState, Queue};

const TOPIC: &str = "usage-detail";

fn transport() -> Arc<MemoryTransport> {
    Arc::new(MemoryTransport::new(
        ChannelConfig::with_capacity(8)
            .with_visibility_timeout(Duration::from_secs(1))
            .with_dequeue_timeout(Duration::from_millis(100))
            .with_enqueue_timeout(Duration::from_millis(100)),
    ))
}

async fn usage_queue(transport: &Arc<MemoryTransport>) -> TransportQueue<UsageDetail> {
    let dyn_transport: Arc<dyn Transport> = transport.clone();
    TransportQueue::connect(dyn_transport, TOPIC).await.unwrap()
}

// ============================================================================
// MemoryTransport
// ============================================================================

#[tokio::test]
async fn test_publish_subscribe_ack() {
    let broker = transport();
    let mut sub = broker.subscribe(TOPIC).await.unwrap();

    broker
        .publish(TOPIC, Bytes::from_static(b"hello"))
        .await
        .unwrap();
    assert_eq!(broker.pending(TOPIC), 1);

    let msg = sub.next().await.unwrap();
    assert_eq!(&msg.payload[..], b"hello");
    assert_eq!(msg.attempt, 1);
    assert_eq!(broker.pending(TOPIC), 1);

    msg.ack.ack().unwrap();
    assert_eq!(broker.pending(TOPIC), 0);
}

#[tokio::test]
async fn test_pending_for_unknown_topic_is_zero() {
    let broker = transport();
    assert_eq!(broker.pending("nope"), 0);
    assert!(broker.topic_names().is_empty());
}

#[tokio::test]
async fn test_try_publish_full_topic() {
    let broker = transport();
    broker.declare_topic(TOPIC, ChannelConfig::with_capacity(1));

    broker.try_publish(TOPIC, Bytes::from_static(b"a")).unwrap();
    let err = broker
        .try_publish(TOPIC, Bytes::from_static(b"b"))
        .unwrap_err();
    assert!(matches!(err, TransportError::PublishTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_poll_timeout_on_empty_topic() {
    let broker = transport();
    let mut sub = broker.subscribe(TOPIC).await.unwrap();

    let err = sub.next().await.unwrap_err();
    assert!(matches!(err, TransportError::PollTimeout(_)));
}

#[tokio::test(start_paused = true)]
async fn test_stale_ack_after_redelivery() {
    let broker = transport();
    let mut sub = broker.subscribe(TOPIC).await.unwrap();
    broker
        .publish(TOPIC, Bytes::from_static(b"x"))
        .await
        .unwrap();

    let first = sub.next().await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let second = sub.next().await.unwrap();
    assert_eq!(second.attempt, 2);

    let err = first.ack.ack().unwrap_err();
    assert!(matches!(err, TransportError::StaleAck(_)));
    second.ack.ack().unwrap();
}

#[test]
fn test_transport_error_mapping() {
    assert!(matches!(
        ChannelError::from(TransportError::TopicClosed("t".into())),
        ChannelError::Closed
    ));
    assert!(matches!(
        ChannelError::from(TransportError::PollTimeout(Duration::from_millis(5))),
        ChannelError::Timeout { op: "dequeue", .. }
    ));
    assert!(ChannelError::from(TransportError::Unavailable("down".into())).is_retriable());
    assert!(matches!(
        ChannelError::from(TransportError::PublishTimeout {
            topic: "t".into(),
            after: Duration::from_millis(5),
        }),
        ChannelError::Timeout { op: "enqueue", .. }
    ));
}

// ============================================================================
// TransportQueue
// ============================================================================

#[tokio::test]
async fn test_queue_round_trip() {
    let broker = transport();
    let queue = usage_queue(&broker).await;

    let detail = UsageDetail::new("user1", 50, 200);
    queue.enqueue(detail.clone()).await.unwrap();

    let d = queue.dequeue().await.unwrap();
    assert_eq!(d.payload(), &detail);
    assert_eq!(d.attempt(), 1);

    let snap = queue.snapshot();
    assert_eq!(snap.in_flight, 1);
    assert_eq!(snap.depth, 0);

    queue.ack(d.token()).unwrap();
    assert_eq!(broker.pending(TOPIC), 0);
    assert_eq!(queue.snapshot().acked, 1);
}

#[tokio::test(start_paused = true)]
async fn test_queue_enqueue_times_out_on_full_topic() {
    let broker = transport();
    broker.declare_topic(
        TOPIC,
        ChannelConfig::with_capacity(1).with_enqueue_timeout(Duration::from_millis(100)),
    );
    let queue = usage_queue(&broker).await;

    queue.enqueue(UsageDetail::new("user1", 1, 1)).await.unwrap();
    let err = queue
        .enqueue(UsageDetail::new("user2", 2, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Timeout { op: "enqueue", .. }));
    assert!(err.is_retriable());

    let err = queue.try_enqueue(UsageDetail::new("user3", 3, 3)).unwrap_err();
    assert!(matches!(err, ChannelError::Full));

    let snap = queue.snapshot();
    assert_eq!(snap.enqueued, 1);
    assert_eq!(snap.rejected, 2);
}

#[tokio::test]
async fn test_queue_accepts_legacy_payload() {
    let broker = transport();
    let queue = usage_queue(&broker).await;

    broker
        .publish(
            TOPIC,
            Bytes::from_static(br#"{"userId":"user3","duration":101,"data":502}"#),
        )
        .await
        .unwrap();

    let d = queue.dequeue().await.unwrap();
    assert_eq!(d.payload(), &UsageDetail::new("user3", 101, 502));
}

#[tokio::test]
async fn test_queue_surfaces_malformed_payload() {
    let broker = transport();
    let queue = usage_queue(&broker).await;

    broker
        .publish(TOPIC, Bytes::from_static(b"not json"))
        .await
        .unwrap();

    let (token, attempt, raw) = match queue.dequeue().await {
        Err(ChannelError::Malformed {
            token, attempt, raw, ..
        }) => (token, attempt, raw),
        other => panic!("expected malformed, got {other:?}"),
    };
    assert_eq!(attempt, 1);
    assert_eq!(&raw[..], b"not json");

    // The delivery is still held and can be settled
    queue.ack(token).unwrap();
    assert_eq!(broker.pending(TOPIC), 0);
}

#[tokio::test]
async fn test_queue_rejects_other_record_kind() {
    let broker = transport();
    let queue = usage_queue(&broker).await;

    let wrong = encode(&UsageCostDetail::new("user1", 5.0, 2.0)).unwrap();
    broker.publish(TOPIC, wrong).await.unwrap();

    match queue.dequeue().await {
        Err(ChannelError::Malformed { reason, .. }) => {
            assert!(reason.contains("usage_cost_detail"));
        }
        other => panic!("expected malformed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_queue_nack_redelivers() {
    let broker = transport();
    let queue = usage_queue(&broker).await;
    queue.enqueue(UsageDetail::new("user2", 1, 1)).await.unwrap();

    let d = queue.dequeue().await.unwrap();
    queue.nack(d.token(), Duration::from_millis(50)).unwrap();
    assert!(matches!(
        queue.ack(d.token()),
        Err(ChannelError::UnknownDelivery(_))
    ));

    let again = loop {
        match queue.dequeue().await {
            Ok(d) => break d,
            Err(ChannelError::Timeout { .. }) => continue,
            Err(e) => panic!("unexpected error: {e}"),
        }
    };
    assert_eq!(again.attempt(), 2);
    assert_eq!(queue.snapshot().redelivered, 1);
}

#[tokio::test(start_paused = true)]
async fn test_queue_drain_then_closed() {
    let broker = transport();
    let queue = usage_queue(&broker).await;
    queue.enqueue(UsageDetail::new("user4", 3, 4)).await.unwrap();

    queue.drain();
    assert_eq!(queue.state(), ChannelState::Draining);
    assert!(matches!(
        queue.try_enqueue(UsageDetail::new("user5", 1, 1)),
        Err(ChannelError::Draining)
    ));

    let d = queue.dequeue().await.unwrap();
    queue.ack(d.token()).unwrap();

    assert_eq!(queue.state(), ChannelState::Closed);
    assert!(matches!(queue.dequeue().await, Err(ChannelError::Closed)));
    tokio::time::timeout(Duration::from_secs(1), queue.closed())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_queue_close_releases_deliveries() {
    let broker = transport();
    let queue = usage_queue(&broker).await;
    queue.enqueue(UsageDetail::new("user1", 1, 1)).await.unwrap();

    let _held = queue.dequeue().await.unwrap();
    assert_eq!(queue.close(), 1);
    assert_eq!(queue.state(), ChannelState::Closed);

    // Still on the broker for another consumer
    assert_eq!(broker.pending(TOPIC), 1);
}
