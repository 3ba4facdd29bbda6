use std::io;

use spindle_task::{TaskError, TaskId};

/// Error returned from [`Scheduler::run_until_complete`] and
/// [`Scheduler::block_on`].
///
/// [`Scheduler::run_until_complete`]: crate::Scheduler::run_until_complete
/// [`Scheduler::block_on`]: crate::Scheduler::block_on
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn poll(err: io::Error) -> Self {
        Self {
            kind: ErrorKind::Poll(err),
        }
    }

    pub(crate) fn root_failed(err: TaskError) -> Self {
        Self {
            kind: ErrorKind::RootFailed(err),
        }
    }

    pub(crate) fn abandoned(task: TaskId) -> Self {
        Self {
            kind: ErrorKind::Abandoned { task },
        }
    }

    pub(crate) fn stalled(blocked: usize) -> Self {
        Self {
            kind: ErrorKind::Stalled { blocked },
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the root task's failure, if that is what this error reports.
    pub fn into_task_error(self) -> Option<TaskError> {
        match self.kind {
            ErrorKind::RootFailed(err) => Some(err),
            _ => None,
        }
    }
}

/// The kind of scheduler error.
#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
    /// The readiness source failed while polling. The run was aborted.
    #[error("readiness source failed: {0}")]
    Poll(#[source] io::Error),

    /// The root task failed. Other tasks still ran to completion.
    #[error("root task failed: {0}")]
    RootFailed(#[source] TaskError),

    /// The root task lost its I/O registration to another task and was never
    /// woken again.
    #[error("root {task} was abandoned before completing")]
    Abandoned {
        /// The root task.
        task: TaskId,
    },

    /// No task was runnable or waiting on I/O while joins were still
    /// outstanding, so none of them could ever be released.
    #[error("scheduler stalled with {blocked} blocked joins")]
    Stalled {
        /// Number of tasks waiting in joins.
        blocked: usize,
    },
}
