use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use spindle_executor::selector::{Readiness, Simulated};
use spindle_executor::{Error, Scheduler};

pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

/// Runs `f` as the root task of a fresh scheduler over simulated streams.
#[allow(dead_code)]
pub fn with_sim<U, F>(f: impl FnOnce(Simulated) -> F) -> Result<U, Error>
where
    F: Future<Output = U> + 'static,
    U: 'static,
{
    init_logging();
    let sim = Simulated::new();
    let mut scheduler = Scheduler::new(sim.clone());
    scheduler.block_on(f(sim))
}

#[allow(dead_code)]
pub fn scheduler<R: Readiness>(readiness: R) -> Scheduler<R> {
    init_logging();
    Scheduler::new(readiness)
}

/// Records the order in which tasks reach their checkpoints.
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<String>>>);

#[allow(dead_code)]
impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}
