//! Bridge a pull-based message queue into push-style subscriptions.
//!
//! A [`PollingConsumer`] is ticked by a [`Scheduler`], drains messages from a
//! [`Queue`] under a per-tick batch cap and a prefetch limit, and publishes a
//! `message-received` notification for each one. Subscribers finish messages
//! with acknowledge, negative-acknowledge or reject.

pub mod consumer;
mod error;
pub mod queue;
pub mod scheduler;

pub use consumer::{
    ConsumerConfig, ConsumerStats, EventName, Notification, PollingConsumer, Received,
    StopReason, SubscriptionId, TickReport,
};
pub use error::{ConsumerError, HandlerError, QueueError, Result};
pub use queue::{DeliveryTag, Flags, InMemoryQueue, Message, Queue};
pub use scheduler::{ManualScheduler, ScheduleHandle, Scheduler, ThreadScheduler, TickFn};
