//! Tally Channel - At-least-once message channels
//!
//! Bounded FIFO queues that decouple pipeline stages. A message is only gone
//! once its consumer acknowledges it; until then it is hidden for the
//! visibility timeout and then handed out again.
//!
//! # Architecture
//!
//! ```text
//! [Producer] --enqueue--> [ ready (FIFO) ] --dequeue--> [Consumer]
//!                               ^                          |
//!                               |   visibility timeout     |
//!                               +------ [ in flight ] <----+
//!                                             |
//!                                            ack --> gone
//! ```
//!
//! # State Machine
//!
//! | State      | enqueue        | dequeue                        |
//! |------------|----------------|--------------------------------|
//! | `Open`     | accepted       | served                         |
//! | `Draining` | `Draining`     | served until empty, then Closed |
//! | `Closed`   | `Closed`       | `Closed`                       |
//!
//! # Backends
//!
//! - `Channel<T>` - in-process typed channel
//! - `TransportQueue<T>` - typed view over a broker `Transport` (bytes on the
//!   wire, versioned codec from `tally-protocol`)
//!
//! Stages only see the `Queue<T>` trait, so either backend (or a test fake)
//! can be plugged in.

mod channel;
mod delivery;
mod error;
mod metrics;
mod queue;
pub mod transport;

pub use channel::{Channel, ChannelConfig};
pub use delivery::{ChannelState, Delivery, DeliveryToken};
pub use error::{ChannelError, Result};
pub use metrics::{ChannelMetrics, ChannelSnapshot};
pub use queue::Queue;
pub use transport::{
    AckHandle, Acknowledger, MemoryTransport, Message, Subscription, Transport, TransportError,
    TransportQueue,
};

/// Default channel capacity (ready + in-flight messages)
pub const DEFAULT_CAPACITY: usize = 1000;

#[cfg(test)]
mod channel_test;
