//! Scheduler - drives periodic ticks.
//!
//! The consumer registers its tick once at construction and cancels it on
//! close. Two implementations are included:
//! - `ManualScheduler` - ticks run only when the caller says so (tests,
//!   embedding in an existing event loop)
//! - `ThreadScheduler` - one background thread per registration

mod manual;
mod thread;

pub use manual::ManualScheduler;
pub use thread::ThreadScheduler;

use std::fmt;
use std::time::Duration;

use crate::consumer::TickReport;
use crate::error::Result;

/// Callback registered with a scheduler. Returns the outcome of one tick.
pub type TickFn = Box<dyn FnMut() -> Result<TickReport> + Send>;

/// Opaque handle identifying one periodic registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(u64);

impl ScheduleHandle {
    pub(crate) fn new(id: u64) -> Self {
        ScheduleHandle(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScheduleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schedule-{}", self.0)
    }
}

/// Periodic callback registry.
///
/// Implementations must never run two ticks of the same registration
/// concurrently: a tick that overruns its interval is either waited for or
/// the missed ticks are skipped.
pub trait Scheduler: Send + Sync {
    /// Register `tick` to run every `interval`.
    fn register_periodic(&self, interval: Duration, tick: TickFn) -> ScheduleHandle;

    /// Stop running the registration. Must be safe to call from inside its own tick.
    fn cancel(&self, handle: &ScheduleHandle);
}
