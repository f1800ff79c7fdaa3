//! Threaded scheduler for background polling.
//!
//! Each registration gets its own thread that sleeps on a stop channel
//! between ticks, so ticks of one registration never overlap.

use std::collections::HashMap;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{ScheduleHandle, Scheduler, TickFn};

/// Runs every registration on a dedicated background thread.
///
/// Ticks are fixed-rate: the next tick is due `interval` after the previous
/// one was due, not after it finished. A tick that overruns is never
/// re-entered; the ticks it missed are skipped.
///
/// Errors returned by a tick are logged and the next tick runs as usual.
///
/// ## Example
///
/// ```ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use pull_consumer::{InMemoryQueue, PollingConsumer, ThreadScheduler};
///
/// let scheduler = Arc::new(ThreadScheduler::new());
/// let consumer = PollingConsumer::new(queue, scheduler.clone(), Duration::from_millis(50), Some(10))?;
/// consumer.on_message(|received| received.ack(Flags::NONE).map(|_| ()).map_err(Into::into));
///
/// // ... later
/// consumer.close();
/// scheduler.shutdown();
/// ```
#[derive(Default)]
pub struct ThreadScheduler {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    workers: HashMap<ScheduleHandle, Worker>,
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of registrations with a running thread.
    pub fn live(&self) -> usize {
        self.inner().workers.len()
    }

    /// Stop every registration and wait for the threads to finish.
    ///
    /// Must not be called from inside a tick.
    pub fn shutdown(&self) {
        let workers: Vec<Worker> = self.inner().workers.drain().map(|(_, w)| w).collect();
        for worker in &workers {
            let _ = worker.stop_tx.send(());
        }
        for worker in workers {
            let _ = worker.handle.join();
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn register_periodic(&self, interval: Duration, mut tick: TickFn) -> ScheduleHandle {
        let (stop_tx, stop_rx) = channel();

        let mut inner = self.inner();
        inner.next_id += 1;
        let schedule = ScheduleHandle::new(inner.next_id);

        let handle = thread::spawn(move || {
            let mut next = Instant::now() + interval;

            loop {
                let wait = next.saturating_duration_since(Instant::now());
                match stop_rx.recv_timeout(wait) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                match tick() {
                    Ok(report) => debug!(
                        schedule = %schedule,
                        dispatched = report.dispatched,
                        stop = ?report.stop,
                        "tick finished"
                    ),
                    Err(err) => warn!(schedule = %schedule, error = %err, "tick failed"),
                }

                next += interval;
                let now = Instant::now();
                let mut skipped = 0u64;
                while next <= now {
                    next += interval;
                    skipped += 1;
                }
                if skipped > 0 {
                    debug!(schedule = %schedule, skipped, "tick overran its interval");
                }
            }
        });

        inner.workers.insert(schedule, Worker { stop_tx, handle });
        schedule
    }

    fn cancel(&self, handle: &ScheduleHandle) {
        // Signal only; joining here would deadlock when a tick cancels itself.
        if let Some(worker) = self.inner().workers.remove(handle) {
            let _ = worker.stop_tx.send(());
        }
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        for worker in self.inner().workers.values() {
            let _ = worker.stop_tx.send(());
        }
        // Don't join on drop - let the threads finish naturally
    }
}
