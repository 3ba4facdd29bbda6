//! The resumption protocol between the scheduler and task bodies.
//!
//! A [`Coroutine`] is resumed with a [`Resume`] value and answers with an
//! [`Outcome`]. Suspension requests are plain data ([`Message`]) so the
//! scheduler can inspect and act on them.
use std::fmt;

use crate::error::TaskError;
use crate::io::{Interest, Token};
use crate::task::{Task, TaskId};

/// The value passed into a task when it is resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resume {
    /// No value. Fresh tasks and woken tasks are resumed with this.
    #[default]
    Empty,
    /// The id of a child task, in answer to [`Message::Spawn`].
    Spawned(TaskId),
}

/// A request a suspended task makes of the scheduler.
pub enum Message {
    /// Schedule a new task. The caller is resumed with [`Resume::Spawned`].
    Spawn(Task),
    /// Resume the caller once the given task has finished.
    Join(TaskId),
    /// Resume the caller once the handle is ready for the given interest.
    IoWait(Interest, Token),
    /// Re-enqueue the caller unchanged.
    Yield,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Spawn(task) => f.debug_tuple("Spawn").field(task).finish(),
            Message::Join(id) => f.debug_tuple("Join").field(id).finish(),
            Message::IoWait(interest, token) => f
                .debug_tuple("IoWait")
                .field(interest)
                .field(token)
                .finish(),
            Message::Yield => f.write_str("Yield"),
        }
    }
}

/// The result of resuming a task once.
#[derive(Debug)]
pub enum Outcome {
    /// The task ran to completion.
    Completed,
    /// The task failed. It must not be resumed again.
    Failed(TaskError),
    /// The task suspended and asks the scheduler to act on the message.
    Suspended(Message),
}

impl Outcome {
    /// Returns `true` for [`Outcome::Completed`] and [`Outcome::Failed`].
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Suspended(_))
    }
}

/// A resumable unit of computation.
///
/// The scheduler calls [`Coroutine::resume`] repeatedly, starting with
/// [`Resume::Empty`], until it returns a terminal [`Outcome`]. It is never
/// resumed again after that.
pub trait Coroutine {
    /// Advance the computation with `input`.
    fn resume(&mut self, input: Resume) -> Outcome;
}

impl<C> Coroutine for Box<C>
where
    C: Coroutine + ?Sized,
{
    fn resume(&mut self, input: Resume) -> Outcome {
        (**self).resume(input)
    }
}

/// Create a [`Coroutine`] from a closure.
///
/// ```rust
/// use spindle_task::coroutine::{self, Coroutine};
/// use spindle_task::{Message, Outcome, Resume};
///
/// let mut remaining = 2;
/// let mut c = coroutine::from_fn(move |_| {
///     if remaining == 0 {
///         return Outcome::Completed;
///     }
///     remaining -= 1;
///     Outcome::Suspended(Message::Yield)
/// });
/// assert!(!c.resume(Resume::Empty).is_terminal());
/// assert!(!c.resume(Resume::Empty).is_terminal());
/// assert!(c.resume(Resume::Empty).is_terminal());
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(Resume) -> Outcome,
{
    FromFn(f)
}

/// A [`Coroutine`] backed by a closure. Created by [`from_fn`].
pub struct FromFn<F>(F);

impl<F> fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FromFn").finish()
    }
}

impl<F> Coroutine for FromFn<F>
where
    F: FnMut(Resume) -> Outcome,
{
    fn resume(&mut self, input: Resume) -> Outcome {
        (self.0)(input)
    }
}
