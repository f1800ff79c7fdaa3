//! Queue - the pull-based message source the consumer drains.
//!
//! ```text
//! ┌──────────────────────┐  try_fetch()            ┌──────────────────────┐
//! │   PollingConsumer    │ ──────────────────────▶ │        Queue         │
//! │  (tick / flow ctl)   │  acknowledge(tag, f)    │  (broker transport)  │
//! │                      │  negative_acknowledge   │                      │
//! │                      │  reject(tag, f)         │                      │
//! └──────────────────────┘ ◀────────────────────── └──────────────────────┘
//!                            Option<Message> / bool
//! ```
//!
//! Implementations wrap a real broker client (AMQP, SQS, Redis lists...).
//! `InMemoryQueue` is included for tests and single-process use.

mod flags;
mod in_memory;
mod message;

pub use flags::Flags;
pub use in_memory::InMemoryQueue;
pub use message::{DeliveryTag, Message};

use crate::error::QueueError;

/// A pull-based message queue.
///
/// `try_fetch` must not block for an unbounded time: it runs on the
/// scheduler's thread and stalls every other tick sharing it.
///
/// Terminal operations return `Ok(false)` when the queue declines the
/// operation (unknown tag, channel closed, ...) and `Err` for transport
/// failures.
pub trait Queue: Send + Sync {
    /// Fetch the next available message, or `None` if nothing is ready.
    fn try_fetch(&self) -> Result<Option<Message>, QueueError>;

    /// Acknowledge a delivered message.
    fn acknowledge(&self, tag: DeliveryTag, flags: Flags) -> Result<bool, QueueError>;

    /// Negatively acknowledge a delivered message.
    fn negative_acknowledge(&self, tag: DeliveryTag, flags: Flags) -> Result<bool, QueueError>;

    /// Reject a delivered message.
    fn reject(&self, tag: DeliveryTag, flags: Flags) -> Result<bool, QueueError>;
}
