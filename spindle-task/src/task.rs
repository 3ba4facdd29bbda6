use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic;

use crate::coroutine::{Coroutine, Outcome, Resume};
use crate::error::TaskError;
use crate::future::FutureCoroutine;

/// The identity of a task within a scheduler.
///
/// Ids are handed out by [`crate::TaskSet`] and are never reused, so an id
/// which is no longer live always refers to a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Build an id from its raw value.
    ///
    /// Only ids handed out by a [`crate::TaskSet`] refer to tasks; a forged
    /// id behaves like the id of a finished task.
    pub fn from_raw(raw: u64) -> Self {
        TaskId(raw)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A resumable unit of work.
///
/// A [`Task`] wraps a [`Coroutine`]. Most tasks are built from a future with
/// [`Task::new`]; the future's output is discarded.
pub struct Task {
    name: Option<Cow<'static, str>>,
    body: Box<dyn Coroutine>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}

impl Task {
    /// Create a task which drives `future` to completion.
    pub fn new<F>(future: F) -> Self
    where
        F: Future + 'static,
    {
        Self::from_coroutine(FutureCoroutine::new(future))
    }

    /// Create a task from an explicit state machine.
    pub fn from_coroutine<C>(coroutine: C) -> Self
    where
        C: Coroutine + 'static,
    {
        Self {
            name: None,
            body: Box::new(coroutine),
        }
    }

    /// Attach a name used in diagnostics.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the task's name, if one was set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Resume the task with `input`.
    ///
    /// A panic raised by the body is caught and reported as
    /// [`Outcome::Failed`].
    pub fn resume(&mut self, input: Resume) -> Outcome {
        let body = &mut self.body;
        match panic::catch_unwind(panic::AssertUnwindSafe(|| body.resume(input))) {
            Ok(outcome) => outcome,
            Err(payload) => Outcome::Failed(TaskError::panic(payload)),
        }
    }
}
