//! Polling Consumer - turns a pull-based queue into push notifications.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  every interval   ┌──────────────────────────────────┐
//! │  Scheduler   │ ────────────────▶ │          PollingConsumer         │
//! └──────────────┘      tick()       │  - prefetch gate                 │
//!                                    │  - try_fetch() until drained /   │
//!                                    │    batch cap / prefetch limit    │
//!                                    │  - outstanding bookkeeping       │
//!                                    └──────────────────────────────────┘
//!                                          │                    ▲
//!                         message-received │                    │ ack / nack / reject
//!                                          ▼                    │
//!                                    ┌──────────────────────────────────┐
//!                                    │           Subscribers            │
//!                                    └──────────────────────────────────┘
//! ```
//!
//! ## Flow control
//!
//! - `max_per_tick` bounds the work one tick does, so a busy queue can't
//!   monopolize a shared scheduler thread.
//! - `prefetch_limit` bounds outstanding messages. A slot is reserved as
//!   soon as a message is fetched and released by a successful terminal
//!   operation, so subscribers that settle synchronously keep the tick going.

mod config;
mod notification;
mod polling;
mod stats;

pub use config::ConsumerConfig;
pub use notification::{EventName, Notification, Received, SubscriptionId};
pub use polling::PollingConsumer;
pub use stats::{ConsumerStats, StopReason, TickReport};
