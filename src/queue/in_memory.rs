//! Broker-free [`Queue`] that tracks delivery tags and settlement.
//!
//! Ready messages wait in FIFO order. `try_fetch` moves the head into an
//! unacknowledged set keyed by its delivery tag, where it stays until a
//! terminal operation settles it. Every settlement is logged so tests can
//! assert on what the consumer did.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{DeliveryTag, Flags, Message, Queue};
use crate::error::QueueError;

/// Queue held entirely in process memory.
///
/// Clones share state. Delivery tags come from a per-queue counter, so a
/// requeued message (`Flags::REQUEUE` on nack or reject) returns to the
/// head under a new tag and the old one is unknown from then on.
/// `Flags::MULTIPLE` on ack or nack settles every unacknowledged tag up to
/// the one given; reject always settles a single tag.
/// [`fail_next_fetch`](InMemoryQueue::fail_next_fetch) makes the next
/// `try_fetch` return a transport error.
///
/// ## Example
///
/// ```
/// use pull_consumer::queue::{Flags, InMemoryQueue, Queue};
///
/// let queue = InMemoryQueue::new();
/// queue.push("order-created");
///
/// let msg = queue.try_fetch().unwrap().unwrap();
/// assert_eq!(msg.payload_str(), Some("order-created"));
/// assert_eq!(queue.unacknowledged().len(), 1);
///
/// assert!(queue.acknowledge(msg.delivery_tag(), Flags::NONE).unwrap());
/// assert!(queue.unacknowledged().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    ready: VecDeque<Message>,
    unacked: BTreeMap<DeliveryTag, Message>,
    next_tag: u64,
    acked: Vec<DeliveryTag>,
    nacked: Vec<DeliveryTag>,
    rejected: Vec<DeliveryTag>,
    fetches: usize,
    fail_next_fetch: Option<QueueError>,
}

impl State {
    fn next_tag(&mut self) -> DeliveryTag {
        self.next_tag += 1;
        DeliveryTag(self.next_tag)
    }

    /// Remove the targeted deliveries from the unacked set.
    fn settle(&mut self, tag: DeliveryTag, multiple: bool) -> Vec<Message> {
        if multiple {
            let keep = match tag.0.checked_add(1) {
                Some(next) => self.unacked.split_off(&DeliveryTag(next)),
                None => BTreeMap::new(),
            };
            let settled = std::mem::replace(&mut self.unacked, keep);
            settled.into_values().collect()
        } else {
            self.unacked.remove(&tag).into_iter().collect()
        }
    }

    fn requeue(&mut self, messages: Vec<Message>) {
        for mut message in messages.into_iter().rev() {
            let tag = self.next_tag();
            message.set_delivery_tag(tag);
            self.ready.push_front(message);
        }
    }
}

impl InMemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a payload and return the delivery tag it was assigned.
    pub fn push(&self, payload: impl Into<Vec<u8>>) -> DeliveryTag {
        self.push_message(Message::new(0, payload.into()))
    }

    /// Enqueue a message. Its delivery tag is replaced by the queue's next tag.
    pub fn push_message(&self, mut message: Message) -> DeliveryTag {
        let mut state = self.state();
        let tag = state.next_tag();
        message.set_delivery_tag(tag);
        state.ready.push_back(message);
        tag
    }

    /// Make the next `try_fetch` fail with the given error.
    pub fn fail_next_fetch(&self, error: QueueError) {
        self.state().fail_next_fetch = Some(error);
    }

    /// Number of messages ready to be fetched.
    pub fn len(&self) -> usize {
        self.state().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().ready.is_empty()
    }

    /// Number of `try_fetch` calls made so far (including empty ones).
    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }

    /// Tags fetched but not yet terminalized, in tag order.
    pub fn unacknowledged(&self) -> Vec<DeliveryTag> {
        self.state().unacked.keys().copied().collect()
    }

    pub fn acknowledged(&self) -> Vec<DeliveryTag> {
        self.state().acked.clone()
    }

    pub fn negatively_acknowledged(&self) -> Vec<DeliveryTag> {
        self.state().nacked.clone()
    }

    pub fn rejected(&self) -> Vec<DeliveryTag> {
        self.state().rejected.clone()
    }
}

impl Queue for InMemoryQueue {
    fn try_fetch(&self) -> Result<Option<Message>, QueueError> {
        let mut state = self.state();
        state.fetches += 1;

        if let Some(error) = state.fail_next_fetch.take() {
            return Err(error);
        }

        let Some(message) = state.ready.pop_front() else {
            return Ok(None);
        };
        state.unacked.insert(message.delivery_tag(), message.clone());
        Ok(Some(message))
    }

    fn acknowledge(&self, tag: DeliveryTag, flags: Flags) -> Result<bool, QueueError> {
        let mut state = self.state();
        let settled = state.settle(tag, flags.contains(Flags::MULTIPLE));
        if settled.is_empty() {
            return Ok(false);
        }
        let tags: Vec<_> = settled.iter().map(Message::delivery_tag).collect();
        state.acked.extend(tags);
        Ok(true)
    }

    fn negative_acknowledge(&self, tag: DeliveryTag, flags: Flags) -> Result<bool, QueueError> {
        let mut state = self.state();
        let settled = state.settle(tag, flags.contains(Flags::MULTIPLE));
        if settled.is_empty() {
            return Ok(false);
        }
        let tags: Vec<_> = settled.iter().map(Message::delivery_tag).collect();
        state.nacked.extend(tags);
        if flags.contains(Flags::REQUEUE) {
            state.requeue(settled);
        }
        Ok(true)
    }

    fn reject(&self, tag: DeliveryTag, flags: Flags) -> Result<bool, QueueError> {
        let mut state = self.state();
        let settled = state.settle(tag, false);
        if settled.is_empty() {
            return Ok(false);
        }
        state.rejected.push(tag);
        if flags.contains(Flags::REQUEUE) {
            state.requeue(settled);
        }
        Ok(true)
    }
}
