use std::sync::atomic::{AtomicUsize, Ordering};

/// Why a tick stopped draining.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The queue had nothing more to fetch.
    Drained,
    /// Outstanding messages reached the prefetch limit.
    PrefetchLimit,
    /// The per-tick batch cap was reached.
    BatchLimit,
    /// A subscriber closed the consumer mid-tick.
    Closed,
}

/// Outcome of one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// Messages fetched and dispatched to subscribers.
    pub dispatched: usize,
    pub stop: StopReason,
}

/// Cumulative counters for a consumer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    pub ticks: usize,
    pub messages_received: usize,
    pub acknowledged: usize,
    pub negatively_acknowledged: usize,
    pub rejected: usize,
    /// Terminal operations the queue reported as failed (`Ok(false)`).
    pub terminal_failures: usize,
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    pub ticks: AtomicUsize,
    pub messages_received: AtomicUsize,
    pub acknowledged: AtomicUsize,
    pub negatively_acknowledged: AtomicUsize,
    pub rejected: AtomicUsize,
    pub terminal_failures: AtomicUsize,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            negatively_acknowledged: self.negatively_acknowledged.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            terminal_failures: self.terminal_failures.load(Ordering::Relaxed),
        }
    }
}
