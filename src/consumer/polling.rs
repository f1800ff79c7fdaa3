use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::config::{validate_prefetch_limit, ConsumerConfig};
use super::notification::{EventName, Handler, Notification, Received, Registry, SubscriptionId};
use super::stats::{ConsumerStats, StatsCounters, StopReason, TickReport};
use crate::error::{ConsumerError, HandlerError, Result};
use crate::queue::{Flags, Message, Queue};
use crate::scheduler::{ScheduleHandle, Scheduler};

#[derive(Clone, Copy, Debug)]
enum Terminal {
    Acknowledge,
    NegativeAcknowledge,
    Reject,
}

impl Terminal {
    fn name(self) -> &'static str {
        match self {
            Terminal::Acknowledge => "acknowledge",
            Terminal::NegativeAcknowledge => "negative_acknowledge",
            Terminal::Reject => "reject",
        }
    }
}

/// Drains a pull-based [`Queue`] on a schedule and pushes each message to
/// subscribers.
///
/// Every tick fetches messages until the queue is empty, the per-tick batch
/// cap is hit, or the number of outstanding (fetched but not yet
/// terminalized) messages reaches the prefetch limit. Each message is
/// published as a `message-received` notification; subscribers finish it
/// with [`acknowledge`], [`negative_acknowledge`] or [`reject`], which frees
/// prefetch capacity.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use pull_consumer::{Flags, InMemoryQueue, ManualScheduler, PollingConsumer};
///
/// let queue = Arc::new(InMemoryQueue::new());
/// let scheduler = Arc::new(ManualScheduler::new());
/// let consumer = PollingConsumer::new(
///     queue.clone(),
///     scheduler.clone(),
///     Duration::from_millis(100),
///     Some(10),
/// )
/// .unwrap();
/// consumer.set_prefetch_limit(2).unwrap();
///
/// consumer.on_message(|received| {
///     received.ack(Flags::NONE)?;
///     Ok(())
/// });
///
/// for i in 0..3 {
///     queue.push(format!("job-{}", i));
/// }
/// let report = consumer.tick().unwrap();
/// assert_eq!(report.dispatched, 3);
/// assert_eq!(consumer.outstanding(), 0);
/// ```
///
/// [`acknowledge`]: PollingConsumer::acknowledge
/// [`negative_acknowledge`]: PollingConsumer::negative_acknowledge
/// [`reject`]: PollingConsumer::reject
pub struct PollingConsumer<Q: Queue + 'static> {
    queue: RwLock<Option<Arc<Q>>>,
    scheduler: Arc<dyn Scheduler>,
    schedule: ScheduleHandle,
    interval: Duration,
    max_per_tick: Option<usize>,
    prefetch_limit: AtomicUsize,
    outstanding: AtomicUsize,
    /// Claimed by the first `close()` call.
    closing: AtomicBool,
    closed: AtomicBool,
    subscribers: RwLock<Registry<Q>>,
    stats: StatsCounters,
}

impl<Q: Queue + 'static> PollingConsumer<Q> {
    /// Create a consumer and register its tick with `scheduler`.
    ///
    /// `max_per_tick` of `None` or `Some(0)` means no per-tick cap. The
    /// prefetch limit starts unbounded; see [`set_prefetch_limit`].
    ///
    /// Fails with `InvalidArgument` if `interval` is zero.
    ///
    /// [`set_prefetch_limit`]: PollingConsumer::set_prefetch_limit
    pub fn new<S>(
        queue: Arc<Q>,
        scheduler: Arc<S>,
        interval: Duration,
        max_per_tick: Option<usize>,
    ) -> Result<Arc<Self>>
    where
        S: Scheduler + 'static,
    {
        if interval.is_zero() {
            return Err(ConsumerError::InvalidArgument(
                "tick interval must be positive".into(),
            ));
        }

        let scheduler: Arc<dyn Scheduler> = scheduler;
        let consumer = Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let schedule = scheduler.register_periodic(
                interval,
                Box::new(move || match weak.upgrade() {
                    Some(consumer) => consumer.tick(),
                    // Not constructed yet, or already dropped.
                    None => Ok(TickReport {
                        dispatched: 0,
                        stop: StopReason::Closed,
                    }),
                }),
            );

            Self {
                queue: RwLock::new(Some(queue)),
                scheduler,
                schedule,
                interval,
                max_per_tick: max_per_tick.filter(|&max| max > 0),
                prefetch_limit: AtomicUsize::new(0),
                outstanding: AtomicUsize::new(0),
                closing: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                subscribers: RwLock::new(Registry::default()),
                stats: StatsCounters::default(),
            }
        });

        info!(
            schedule = %consumer.schedule,
            interval_ms = interval.as_millis() as u64,
            max_per_tick = ?consumer.max_per_tick,
            "polling consumer started"
        );
        Ok(consumer)
    }

    /// Create a consumer from a [`ConsumerConfig`], applying its prefetch limit.
    pub fn from_config<S>(queue: Arc<Q>, scheduler: Arc<S>, config: &ConsumerConfig) -> Result<Arc<Self>>
    where
        S: Scheduler + 'static,
    {
        config.validate()?;
        let consumer = Self::new(queue, scheduler, config.interval(), config.max_per_tick)?;
        consumer.set_prefetch_limit(config.prefetch_limit)?;
        Ok(consumer)
    }

    fn subscribers(&self) -> RwLockReadGuard<'_, Registry<Q>> {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribers_mut(&self) -> RwLockWriteGuard<'_, Registry<Q>> {
        self.subscribers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue_ref(&self, operation: &str) -> Result<Arc<Q>> {
        self.queue
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ConsumerError::closed(operation))
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.is_closed() {
            return Err(ConsumerError::closed(operation));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Flow control
    // ------------------------------------------------------------------

    /// Cap the number of outstanding messages (0 = unbounded).
    ///
    /// Takes effect from the next fetch; an already-exceeded count is not
    /// reconciled. Fails with `InvalidArgument` for negative input and
    /// `IllegalState` after close, leaving the limit unchanged.
    pub fn set_prefetch_limit(&self, count: i64) -> Result<()> {
        self.ensure_open("set_prefetch_limit")?;
        let limit = validate_prefetch_limit(count)?;
        self.prefetch_limit.store(limit, Ordering::SeqCst);
        debug!(schedule = %self.schedule, limit, "prefetch limit set");
        Ok(())
    }

    pub fn prefetch_limit(&self) -> usize {
        self.prefetch_limit.load(Ordering::SeqCst)
    }

    pub fn max_per_tick(&self) -> Option<usize> {
        self.max_per_tick
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Messages fetched but not yet acknowledged, nacked or rejected.
    ///
    /// Only tracked while a prefetch limit is set.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn at_capacity(&self) -> bool {
        let limit = self.prefetch_limit();
        limit > 0 && self.outstanding() >= limit
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Drain eligible messages and publish a `message-received`
    /// notification for each.
    ///
    /// Normally called by the scheduler. Fetch and subscriber errors abort
    /// the tick and are returned as-is; a message whose dispatch failed keeps
    /// its prefetch reservation.
    pub fn tick(&self) -> Result<TickReport> {
        self.ensure_open("tick")?;
        let queue = self.queue_ref("tick")?;
        StatsCounters::bump(&self.stats.ticks);

        let mut dispatched = 0;
        let stop = loop {
            if self.closing.load(Ordering::SeqCst) {
                break StopReason::Closed;
            }
            if self.at_capacity() {
                break StopReason::PrefetchLimit;
            }

            let Some(message) = queue.try_fetch()? else {
                break StopReason::Drained;
            };

            // Reserve before dispatch so a subscriber fetching more elsewhere can't overshoot.
            if self.prefetch_limit() > 0 {
                self.outstanding.fetch_add(1, Ordering::SeqCst);
            }
            StatsCounters::bump(&self.stats.messages_received);

            self.dispatch(&message, &queue)?;
            dispatched += 1;

            if self.at_capacity() {
                break StopReason::PrefetchLimit;
            }
            if self.max_per_tick.is_some_and(|max| dispatched >= max) {
                break StopReason::BatchLimit;
            }
        };

        debug!(
            schedule = %self.schedule,
            dispatched,
            outstanding = self.outstanding(),
            stop = ?stop,
            "tick complete"
        );
        Ok(TickReport { dispatched, stop })
    }

    fn dispatch(&self, message: &Message, queue: &Q) -> Result<()> {
        let handlers = self.subscribers().snapshot(EventName::MessageReceived);
        debug!(
            tag = %message.delivery_tag(),
            subscribers = handlers.len(),
            "dispatching message"
        );

        let notification = Notification::MessageReceived(Received::new(message, queue, self));
        for handler in handlers {
            handler(&notification)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Terminal operations
    // ------------------------------------------------------------------

    /// Acknowledge a message. Returns the queue's result unchanged.
    ///
    /// On success one unit of prefetch capacity is released, whatever the
    /// flags (a `MULTIPLE` acknowledge still counts once).
    pub fn acknowledge(&self, message: &Message, flags: Flags) -> Result<bool> {
        self.terminal(Terminal::Acknowledge, message, flags)
    }

    /// Negatively acknowledge a message. Returns the queue's result unchanged.
    pub fn negative_acknowledge(&self, message: &Message, flags: Flags) -> Result<bool> {
        self.terminal(Terminal::NegativeAcknowledge, message, flags)
    }

    /// Reject a message. Returns the queue's result unchanged.
    pub fn reject(&self, message: &Message, flags: Flags) -> Result<bool> {
        self.terminal(Terminal::Reject, message, flags)
    }

    fn terminal(&self, op: Terminal, message: &Message, flags: Flags) -> Result<bool> {
        self.ensure_open(op.name())?;
        let queue = self.queue_ref(op.name())?;
        let tag = message.delivery_tag();

        let settled = match op {
            Terminal::Acknowledge => queue.acknowledge(tag, flags)?,
            Terminal::NegativeAcknowledge => queue.negative_acknowledge(tag, flags)?,
            Terminal::Reject => queue.reject(tag, flags)?,
        };

        if settled {
            self.release_one();
            let counter = match op {
                Terminal::Acknowledge => &self.stats.acknowledged,
                Terminal::NegativeAcknowledge => &self.stats.negatively_acknowledged,
                Terminal::Reject => &self.stats.rejected,
            };
            StatsCounters::bump(counter);
        } else {
            StatsCounters::bump(&self.stats.terminal_failures);
            warn!(tag = %tag, flags = %flags, operation = op.name(), "queue refused terminal operation");
        }
        Ok(settled)
    }

    fn release_one(&self) {
        // Never below zero; the closure always returns Some so this can't fail.
        let _ = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Subscribe to an event. Handlers run in registration order.
    ///
    /// After close the handler is dropped without being stored: it never
    /// runs, and `off` with the returned id reports `false`.
    pub fn on<F>(&self, event: EventName, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification<'_, Q>) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        let handler: Handler<Q> = Arc::new(handler);
        self.subscribers_mut().add(event, handler)
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn off(&self, event: EventName, id: SubscriptionId) -> bool {
        self.subscribers_mut().remove(event, id)
    }

    /// Subscribe to `message-received`. Does nothing after close.
    pub fn on_message<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Received<'_, Q>) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.on(EventName::MessageReceived, move |notification: &Notification<'_, Q>| {
            match notification {
                Notification::MessageReceived(received) => handler(received),
                Notification::Closed(_) => Ok(()),
            }
        })
    }

    /// Subscribe to `closed`. Does nothing after close.
    pub fn on_closed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&PollingConsumer<Q>) + Send + Sync + 'static,
    {
        self.on(EventName::Closed, move |notification: &Notification<'_, Q>| {
            if let Notification::Closed(consumer) = notification {
                handler(consumer);
            }
            Ok(())
        })
    }

    pub fn subscriber_count(&self, event: EventName) -> usize {
        self.subscribers().len(event)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// The underlying queue, for operations the consumer does not model.
    ///
    /// Terminal operations made through it bypass outstanding bookkeeping.
    /// Fails with `IllegalState` after close.
    pub fn queue(&self) -> Result<Arc<Q>> {
        self.ensure_open("queue")?;
        self.queue_ref("queue")
    }

    pub fn schedule_handle(&self) -> ScheduleHandle {
        self.schedule
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the consumer. Only the first call has any effect.
    ///
    /// Publishes `closed` (subscribers may still settle messages at this
    /// point), cancels the schedule, drops every subscription and releases
    /// the queue. Errors from `closed` subscribers are logged, not returned.
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        let handlers = self.subscribers().snapshot(EventName::Closed);
        let notification = Notification::Closed(self);
        for handler in handlers {
            if let Err(err) = handler(&notification) {
                warn!(schedule = %self.schedule, error = %err, "closed subscriber failed");
            }
        }

        self.scheduler.cancel(&self.schedule);
        self.subscribers_mut().seal();
        self.queue
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.closed.store(true, Ordering::SeqCst);

        info!(
            schedule = %self.schedule,
            outstanding = self.outstanding(),
            "polling consumer closed"
        );
    }
}

impl<Q: Queue + 'static> Drop for PollingConsumer<Q> {
    fn drop(&mut self) {
        if !self.closing.load(Ordering::SeqCst) {
            self.scheduler.cancel(&self.schedule);
        }
    }
}
