//! Caller-driven scheduler.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{ScheduleHandle, Scheduler, TickFn};
use crate::consumer::TickReport;
use crate::error::Result;

/// A scheduler that only runs ticks when asked.
///
/// Intervals are recorded but ignored; every call to [`run_once`] fires each
/// live registration exactly once, in registration order. Useful for
/// deterministic tests and for embedding consumers in a loop you already own.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use pull_consumer::{InMemoryQueue, ManualScheduler, PollingConsumer};
///
/// let queue = Arc::new(InMemoryQueue::new());
/// let scheduler = Arc::new(ManualScheduler::new());
/// let consumer = PollingConsumer::new(
///     queue.clone(),
///     scheduler.clone(),
///     Duration::from_millis(50),
///     None,
/// )
/// .unwrap();
///
/// queue.push("hello");
/// let reports = scheduler.run_once();
/// assert_eq!(reports[0].as_ref().unwrap().dispatched, 1);
///
/// consumer.close();
/// assert_eq!(scheduler.cancellations(), 1);
/// ```
///
/// [`run_once`]: ManualScheduler::run_once
#[derive(Default)]
pub struct ManualScheduler {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    registrations: Vec<Registration>,
    cancellations: usize,
    cancel_calls: usize,
}

struct Registration {
    handle: ScheduleHandle,
    interval: Duration,
    /// `None` while the tick is running or after cancellation.
    tick: Option<TickFn>,
    cancelled: bool,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire every live registration once and collect the tick results.
    ///
    /// No lock is held while a tick runs, so ticks may cancel themselves or
    /// register new callbacks; new registrations first run on the next call.
    pub fn run_once(&self) -> Vec<Result<TickReport>> {
        let handles: Vec<ScheduleHandle> = self
            .inner()
            .registrations
            .iter()
            .filter(|r| !r.cancelled)
            .map(|r| r.handle)
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let tick = self
                .inner()
                .registrations
                .iter_mut()
                .find(|r| r.handle == handle && !r.cancelled)
                .and_then(|r| r.tick.take());
            let Some(mut tick) = tick else {
                continue;
            };

            results.push(tick());

            let mut inner = self.inner();
            if let Some(reg) = inner
                .registrations
                .iter_mut()
                .find(|r| r.handle == handle && !r.cancelled)
            {
                reg.tick = Some(tick);
            }
        }
        results
    }

    /// Run `n` rounds of [`run_once`](ManualScheduler::run_once).
    pub fn run(&self, n: usize) -> Vec<Result<TickReport>> {
        (0..n).flat_map(|_| self.run_once()).collect()
    }

    /// Number of registrations that have not been cancelled.
    pub fn live(&self) -> usize {
        self.inner()
            .registrations
            .iter()
            .filter(|r| !r.cancelled)
            .count()
    }

    /// Total number of `cancel` calls that hit a live registration.
    pub fn cancellations(&self) -> usize {
        self.inner().cancellations
    }

    /// Total number of `cancel` calls, including repeats and unknown handles.
    pub fn cancel_calls(&self) -> usize {
        self.inner().cancel_calls
    }

    /// Interval recorded for a registration.
    pub fn interval(&self, handle: &ScheduleHandle) -> Option<Duration> {
        self.inner()
            .registrations
            .iter()
            .find(|r| r.handle == *handle)
            .map(|r| r.interval)
    }
}

impl Scheduler for ManualScheduler {
    fn register_periodic(&self, interval: Duration, tick: TickFn) -> ScheduleHandle {
        let mut inner = self.inner();
        inner.next_id += 1;
        let handle = ScheduleHandle::new(inner.next_id);
        inner.registrations.push(Registration {
            handle,
            interval,
            tick: Some(tick),
            cancelled: false,
        });
        handle
    }

    fn cancel(&self, handle: &ScheduleHandle) {
        let mut inner = self.inner();
        inner.cancel_calls += 1;
        let Some(reg) = inner
            .registrations
            .iter_mut()
            .find(|r| r.handle == *handle && !r.cancelled)
        else {
            return;
        };
        reg.cancelled = true;
        let tick = reg.tick.take();
        inner.cancellations += 1;
        drop(inner);
        drop(tick);
    }
}
