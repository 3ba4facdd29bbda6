//! Provides a single-threaded cooperative scheduler for driving
//! [`spindle_task`] tasks to completion.
//!
//! The [`Scheduler`] owns a FIFO ready queue, a [`selector::Selector`] for
//! tasks waiting on I/O, and a watch list for tasks waiting on other tasks.
//! Tasks never touch these directly: they suspend with a [`Message`] and the
//! scheduler acts on it.
//!
//! ```rust
//! use spindle_executor::selector::Simulated;
//! use spindle_executor::{gather, Scheduler};
//! use spindle_task::Task;
//!
//! let sim = Simulated::new();
//! let mut scheduler = Scheduler::new(sim.clone());
//! let mut a = sim.stream("A", 2);
//! let mut b = sim.stream("B", 1);
//!
//! scheduler
//!     .block_on(async move {
//!         gather(vec![
//!             Task::new(async move { spindle_task::write(&mut a, b"one").await }),
//!             Task::new(async move { spindle_task::write(&mut b, b"two").await }),
//!         ])
//!         .await
//!     })
//!     .unwrap();
//! ```
//!
//! # Modules
//! - [`selector`]: the readiness registry and built-in readiness sources.
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]
use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::mem;
use std::rc::Rc;

use log::{debug, trace, warn};
use smallvec::SmallVec;
use spindle_task::{Message, Outcome, Resume, Task, TaskError, TaskId, TaskSet};

mod builder;
mod error;
/// The readiness registry and built-in readiness sources.
pub mod selector;

pub use builder::Builder;
pub use error::{Error, ErrorKind};
pub use spindle_task::{
    gather, join, read, readable, spawn, spawn_task, writable, write, yield_now,
};

use selector::{PollMode, Readiness, Selector};

const LOG: &str = "spindle_executor::scheduler";

type Watchers = SmallVec<[TaskId; 2]>;

/// Counters describing the most recent run of a [`Scheduler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Loop iterations which resumed at least one task.
    pub iterations: u64,
    /// Calls to [`Task::resume`].
    pub resumes: u64,
    /// Tasks created through [`Message::Spawn`].
    pub spawned: u64,
    /// Tasks which ran to completion, the root included.
    pub completed: u64,
    /// Tasks which failed, the root included.
    pub failed: u64,
    /// Waiting tasks dropped because another task registered the same handle.
    pub displaced: u64,
    /// Calls to [`Selector::poll`].
    pub polls: u64,
}

struct Root {
    id: TaskId,
    failure: Option<TaskError>,
}

/// A single-threaded cooperative scheduler.
///
/// A [`Scheduler`] is driven by calling [`Scheduler::run_until_complete`] or
/// [`Scheduler::block_on`], which return once no task is runnable, waiting
/// on I/O, or waiting on another task.
pub struct Scheduler<R: Readiness> {
    tasks: TaskSet,
    /// Tasks which are ready to be resumed, with their resume values.
    ready: VecDeque<(TaskId, Resume)>,
    /// Spare queue swapped with `ready` at the start of each iteration.
    batch: VecDeque<(TaskId, Resume)>,
    selector: Selector<R>,
    /// Tasks waiting for the key task to finish.
    watchers: HashMap<TaskId, Watchers>,
    /// Tasks dropped after losing their I/O registration. They never finish,
    /// so joining one blocks until the run stalls.
    displaced: HashSet<TaskId>,
    config: Builder,
    root: Option<Root>,
    stats: Stats,
}

impl<R: Readiness> std::fmt::Debug for Scheduler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.tasks)
            .field("ready", &self.ready.len())
            .field("io_waiters", &self.selector.len())
            .field("watched", &self.watchers.len())
            .field("displaced", &self.displaced.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<R: Readiness> Scheduler<R> {
    /// Construct a new [`Scheduler`] with the default configuration.
    ///
    /// The scheduler uses `readiness` to decide when tasks waiting on I/O
    /// may continue.
    pub fn new(readiness: R) -> Self {
        Builder::new().build(readiness)
    }

    pub(crate) fn with_builder(config: Builder, readiness: R) -> Self {
        Self {
            tasks: TaskSet::new(),
            ready: VecDeque::with_capacity(config.ready_capacity),
            batch: VecDeque::with_capacity(config.ready_capacity),
            selector: Selector::new(readiness),
            watchers: HashMap::new(),
            displaced: HashSet::new(),
            config,
            root: None,
            stats: Stats::default(),
        }
    }

    /// Run `root` and every task it transitively spawns until none is left
    /// runnable, waiting on I/O, or waiting on another task.
    ///
    /// Failures of tasks other than the root are logged and otherwise only
    /// observable through their joiners being released. A task which loses
    /// its I/O registration to another task is dropped immediately.
    ///
    /// ### Errors
    /// - the readiness source failed while polling;
    /// - the root task failed (reported once the run has finished);
    /// - the root task lost its I/O registration and never completed;
    /// - joins were outstanding with nothing left that could release them.
    pub fn run_until_complete(&mut self, root: Task) -> Result<(), Error> {
        self.stats = Stats::default();
        let name = root.name().unwrap_or("-").to_owned();
        let id = self.tasks.insert(root);
        self.root = Some(Root { id, failure: None });
        self.ready.push_back((id, Resume::Empty));
        debug!(target: LOG, "run.start {id} name={name}");

        let result = self.run();
        let root_live = self.tasks.contains(id) || self.displaced.contains(&id);
        let root = self.root.take();
        self.reset();
        debug!(target: LOG, "run.finish {:?}", self.stats);

        result?;
        if let Some(Root {
            failure: Some(err), ..
        }) = root
        {
            return Err(Error::root_failed(err));
        }
        if root_live {
            return Err(Error::abandoned(id));
        }
        Ok(())
    }

    /// Run `future` as the root task and return its output.
    ///
    /// See [`Scheduler::run_until_complete`] for how the run proceeds and
    /// which errors it reports.
    pub fn block_on<F>(&mut self, future: F) -> Result<F::Output, Error>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let output = Rc::new(Cell::new(None));
        let slot = Rc::clone(&output);
        let root = Task::new(async move {
            slot.set(Some(future.await));
        })
        .named("block_on");

        self.run_until_complete(root)?;
        Ok(output
            .take()
            .expect("root task completed without producing output"))
    }

    /// Returns counters for the most recent run.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Returns a reference to the readiness source.
    pub fn readiness(&self) -> &R {
        self.selector.readiness()
    }

    fn run(&mut self) -> Result<(), Error> {
        loop {
            if !self.selector.is_empty() {
                let mode = if self.ready.is_empty() {
                    PollMode::Wait(self.config.poll_timeout)
                } else {
                    PollMode::NoWait
                };
                self.stats.polls += 1;
                for event in self.selector.poll(mode).map_err(Error::poll)? {
                    trace!(target: LOG, "io.ready {} {}", event.task, event.token);
                    self.ready.push_back((event.task, Resume::Empty));
                }
            }

            if self.ready.is_empty() {
                if !self.selector.is_empty() {
                    // Draining: only I/O can make progress.
                    continue;
                }
                if self.watchers.is_empty() {
                    return Ok(());
                }
                let blocked = self.watchers.values().map(|w| w.len()).sum();
                warn!(target: LOG, "run.stalled blocked={blocked}");
                return Err(Error::stalled(blocked));
            }

            self.stats.iterations += 1;
            let mut batch = mem::replace(&mut self.ready, mem::take(&mut self.batch));
            trace!(target: LOG, "iteration {} batch={}", self.stats.iterations, batch.len());
            for (id, input) in batch.drain(..) {
                self.step(id, input);
            }
            self.batch = batch;
        }
    }

    fn step(&mut self, id: TaskId, input: Resume) {
        self.stats.resumes += 1;
        let Some(outcome) = self.tasks.resume(id, input) else {
            warn!(target: LOG, "resume.unknown {id}");
            return;
        };

        match outcome {
            Outcome::Completed => {
                trace!(target: LOG, "task.complete {id}");
                self.stats.completed += 1;
                self.wake_watchers(id);
            }
            Outcome::Failed(err) => self.fail(id, err),
            Outcome::Suspended(Message::Spawn(child)) => {
                let name = child.name().unwrap_or("-").to_owned();
                let child_id = self.tasks.insert(child);
                trace!(target: LOG, "task.spawn {child_id} name={name} parent={id}");
                self.stats.spawned += 1;
                self.ready.push_back((child_id, Resume::Empty));
                self.ready.push_back((id, Resume::Spawned(child_id)));
            }
            Outcome::Suspended(Message::Join(target)) => {
                if self.tasks.contains(target) || self.displaced.contains(&target) {
                    trace!(target: LOG, "task.join {id} => {target}");
                    self.watchers.entry(target).or_default().push(id);
                } else {
                    trace!(target: LOG, "task.join.finished {id} => {target}");
                    self.ready.push_back((id, Resume::Empty));
                }
            }
            Outcome::Suspended(Message::IoWait(interest, token)) => {
                match self.selector.register(token, interest, id) {
                    Ok(None) => {}
                    Ok(Some(displaced)) => self.displace(displaced),
                    Err(err) => {
                        self.tasks.remove(id);
                        self.fail(id, TaskError::io(err));
                    }
                }
            }
            Outcome::Suspended(Message::Yield) => {
                self.ready.push_back((id, Resume::Empty));
            }
        }
    }

    fn fail(&mut self, id: TaskId, err: TaskError) {
        self.stats.failed += 1;
        match &mut self.root {
            Some(root) if root.id == id => {
                warn!(target: LOG, "root.failed {id} {err}");
                root.failure = Some(err);
            }
            _ => warn!(target: LOG, "task.failed {id} {err}"),
        }
        self.wake_watchers(id);
    }

    /// Drop a task which lost its I/O registration to another task.
    ///
    /// Its joiners stay parked: the task never finishes.
    fn displace(&mut self, id: TaskId) {
        self.stats.displaced += 1;
        let name = self.tasks.name(id).unwrap_or("-").to_owned();
        debug!(target: LOG, "task.displaced {id} name={name}");
        self.tasks.remove(id);
        self.displaced.insert(id);
    }

    fn wake_watchers(&mut self, id: TaskId) {
        if let Some(watchers) = self.watchers.remove(&id) {
            trace!(target: LOG, "task.wake {id} watchers={}", watchers.len());
            for watcher in watchers {
                self.ready.push_back((watcher, Resume::Empty));
            }
        }
    }

    /// Drop every task and registration left over from a run.
    fn reset(&mut self) {
        if !self.tasks.is_empty() {
            warn!(target: LOG, "run.abandoned tasks={}", self.tasks.len());
        }
        self.tasks.clear();
        self.ready.clear();
        self.watchers.clear();
        self.displaced.clear();
        self.selector.clear();
    }
}

impl<R: Readiness> Drop for Scheduler<R> {
    fn drop(&mut self) {
        self.tasks.clear();
        self.selector.clear();
    }
}
