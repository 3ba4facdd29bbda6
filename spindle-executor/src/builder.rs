use std::time::Duration;

use crate::selector::Readiness;
use crate::Scheduler;

/// Default capacity of the ready queue.
const READY_CAPACITY: usize = 1024;

/// Configures and builds a [`Scheduler`].
///
/// ```rust
/// use std::time::Duration;
///
/// use spindle_executor::selector::Simulated;
/// use spindle_executor::Builder;
///
/// let scheduler = Builder::new()
///     .ready_capacity(64)
///     .poll_timeout(Duration::from_millis(50))
///     .build(Simulated::new());
/// # drop(scheduler);
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    pub(crate) ready_capacity: usize,
    pub(crate) poll_timeout: Option<Duration>,
}

impl Builder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            ready_capacity: READY_CAPACITY,
            poll_timeout: None,
        }
    }

    /// Preallocate room for `capacity` entries in the ready queue.
    pub fn ready_capacity(mut self, capacity: usize) -> Self {
        self.ready_capacity = capacity;
        self
    }

    /// Bound how long the scheduler waits for readiness when no task is
    /// runnable.
    ///
    /// By default the scheduler waits until a handle becomes ready. With a
    /// timeout it wakes up and polls again; the observable behavior is the
    /// same, but it never sits in a single readiness call for longer than
    /// `timeout`.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    /// Build a [`Scheduler`] polling `readiness`.
    pub fn build<R: Readiness>(self, readiness: R) -> Scheduler<R> {
        Scheduler::with_builder(self, readiness)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
