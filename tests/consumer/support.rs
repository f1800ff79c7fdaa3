//! Shared fixtures for consumer tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pull_consumer::{
    DeliveryTag, Flags, InMemoryQueue, ManualScheduler, Message, PollingConsumer, Queue,
    QueueError,
};

/// Install a test-writer tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A consumer wired to a manual scheduler.
pub struct Harness<Q: Queue + 'static> {
    pub queue: Arc<Q>,
    pub scheduler: Arc<ManualScheduler>,
    pub consumer: Arc<PollingConsumer<Q>>,
}

pub fn harness(max_per_tick: Option<usize>) -> Harness<InMemoryQueue> {
    harness_with(InMemoryQueue::new(), max_per_tick)
}

pub fn harness_with<Q: Queue + 'static>(queue: Q, max_per_tick: Option<usize>) -> Harness<Q> {
    init_tracing();
    let queue = Arc::new(queue);
    let scheduler = Arc::new(ManualScheduler::new());
    let consumer = PollingConsumer::new(
        queue.clone(),
        scheduler.clone(),
        Duration::from_millis(25),
        max_per_tick,
    )
    .unwrap();
    Harness {
        queue,
        scheduler,
        consumer,
    }
}

/// Push `n` string messages named `msg-0`, `msg-1`, ...
pub fn fill(queue: &InMemoryQueue, n: usize) -> Vec<DeliveryTag> {
    (0..n).map(|i| queue.push(format!("msg-{}", i))).collect()
}

/// Records every message delivered to a subscriber.
#[derive(Clone, Default)]
pub struct Recorder {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach<Q: Queue + 'static>(&self, consumer: &PollingConsumer<Q>) {
        let messages = Arc::clone(&self.messages);
        consumer.on_message(move |received| {
            messages.lock().unwrap().push(received.message().clone());
            Ok(())
        });
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.payload_str().unwrap_or_default().to_string())
            .collect()
    }
}

/// Wraps an `InMemoryQueue` and fails terminal operations on demand.
#[derive(Clone, Default)]
pub struct FlakyQueue {
    pub inner: InMemoryQueue,
    transport_down: Arc<AtomicBool>,
}

impl FlakyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every terminal operation return a transport error.
    pub fn break_transport(&self) {
        self.transport_down.store(true, Ordering::SeqCst);
    }

    pub fn restore_transport(&self) {
        self.transport_down.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), QueueError> {
        if self.transport_down.load(Ordering::SeqCst) {
            return Err(QueueError::ConnectionFailed("channel closed".into()));
        }
        Ok(())
    }
}

impl Queue for FlakyQueue {
    fn try_fetch(&self) -> Result<Option<Message>, QueueError> {
        self.inner.try_fetch()
    }

    fn acknowledge(&self, tag: DeliveryTag, flags: Flags) -> Result<bool, QueueError> {
        self.check()?;
        self.inner.acknowledge(tag, flags)
    }

    fn negative_acknowledge(&self, tag: DeliveryTag, flags: Flags) -> Result<bool, QueueError> {
        self.check()?;
        self.inner.negative_acknowledge(tag, flags)
    }

    fn reject(&self, tag: DeliveryTag, flags: Flags) -> Result<bool, QueueError> {
        self.check()?;
        self.inner.reject(tag, flags)
    }
}
