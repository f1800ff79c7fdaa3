//! Subscriber registry and the notifications it delivers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::PollingConsumer;
use crate::error::{HandlerError, Result};
use crate::queue::{Flags, Message, Queue};

/// Events a consumer publishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    /// A message was fetched and is waiting for a terminal operation.
    MessageReceived,
    /// The consumer was closed.
    Closed,
}

impl EventName {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventName::MessageReceived => "message-received",
            EventName::Closed => "closed",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by `on`; pass it to `off` to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A notification delivered to subscribers.
pub enum Notification<'a, Q: Queue + 'static> {
    MessageReceived(Received<'a, Q>),
    Closed(&'a PollingConsumer<Q>),
}

impl<Q: Queue + 'static> Notification<'_, Q> {
    pub fn event_name(&self) -> EventName {
        match self {
            Notification::MessageReceived(_) => EventName::MessageReceived,
            Notification::Closed(_) => EventName::Closed,
        }
    }
}

/// A fetched message, handed to `message-received` subscribers.
///
/// The terminal shortcuts go through the consumer so the outstanding count
/// stays in step. Calling the raw [`queue`](Received::queue) directly
/// bypasses that bookkeeping.
pub struct Received<'a, Q: Queue + 'static> {
    message: &'a Message,
    queue: &'a Q,
    consumer: &'a PollingConsumer<Q>,
}

impl<'a, Q: Queue + 'static> Received<'a, Q> {
    pub(crate) fn new(message: &'a Message, queue: &'a Q, consumer: &'a PollingConsumer<Q>) -> Self {
        Self {
            message,
            queue,
            consumer,
        }
    }

    pub fn message(&self) -> &'a Message {
        self.message
    }

    pub fn queue(&self) -> &'a Q {
        self.queue
    }

    pub fn consumer(&self) -> &'a PollingConsumer<Q> {
        self.consumer
    }

    pub fn ack(&self, flags: Flags) -> Result<bool> {
        self.consumer.acknowledge(self.message, flags)
    }

    pub fn nack(&self, flags: Flags) -> Result<bool> {
        self.consumer.negative_acknowledge(self.message, flags)
    }

    pub fn reject(&self, flags: Flags) -> Result<bool> {
        self.consumer.reject(self.message, flags)
    }
}

pub(crate) type Handler<Q> =
    Arc<dyn Fn(&Notification<'_, Q>) -> std::result::Result<(), HandlerError> + Send + Sync>;

/// Ordered handler lists keyed by event name.
pub(crate) struct Registry<Q: Queue + 'static> {
    next_id: u64,
    handlers: HashMap<EventName, Vec<(SubscriptionId, Handler<Q>)>>,
    /// Set by `seal`; later handlers are dropped instead of stored.
    sealed: bool,
}

impl<Q: Queue + 'static> Default for Registry<Q> {
    fn default() -> Self {
        Self {
            next_id: 0,
            handlers: HashMap::new(),
            sealed: false,
        }
    }
}

impl<Q: Queue + 'static> Registry<Q> {
    pub fn add(&mut self, event: EventName, handler: Handler<Q>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        if !self.sealed {
            self.handlers.entry(event).or_default().push((id, handler));
        }
        id
    }

    pub fn remove(&mut self, event: EventName, id: SubscriptionId) -> bool {
        let Some(list) = self.handlers.get_mut(&event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    /// Handlers for `event` in registration order, detached from the registry
    /// so they can run without holding its lock.
    pub fn snapshot(&self, event: EventName) -> Vec<Handler<Q>> {
        self.handlers
            .get(&event)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, event: EventName) -> usize {
        self.handlers.get(&event).map_or(0, Vec::len)
    }

    /// Drop every handler and refuse new ones.
    pub fn seal(&mut self) {
        self.handlers.clear();
        self.sealed = true;
    }
}
