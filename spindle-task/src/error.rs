use std::any::Any;
use std::io;

/// [`TaskError`] indicates a failure in a task.
///
/// Tasks fail for one of three reasons: the body panicked, a hand-written
/// [`Coroutine`] reported a failure, or the scheduler could not register the
/// task's I/O wait. Check which via [`TaskError::is_panic`],
/// [`TaskError::is_failed`] and [`TaskError::is_io`].
///
/// [`Coroutine`]: crate::Coroutine
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct TaskError {
    kind: Kind,
}

#[derive(Debug, thiserror::Error)]
enum Kind {
    #[error("task panicked: {message}")]
    Panic {
        message: String,
        #[allow(dead_code)]
        payload: Box<dyn Any + Send + 'static>,
    },
    #[error("task failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + 'static>),
    #[error("task could not wait for readiness: {0}")]
    Io(#[source] io::Error),
}

impl TaskError {
    /// Build an error from a panic payload.
    pub fn panic(payload: Box<dyn Any + Send + 'static>) -> TaskError {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("Box<dyn Any>")
        };
        TaskError {
            kind: Kind::Panic { message, payload },
        }
    }

    /// Build an error reported by the task body itself.
    pub fn failed<E>(err: E) -> TaskError
    where
        E: Into<Box<dyn std::error::Error + 'static>>,
    {
        TaskError {
            kind: Kind::Failed(err.into()),
        }
    }

    /// Build an error for a failed readiness registration.
    pub fn io(err: io::Error) -> TaskError {
        TaskError {
            kind: Kind::Io(err),
        }
    }

    /// Returns `true` if the task panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self.kind, Kind::Panic { .. })
    }

    /// Returns `true` if the task body reported a failure.
    pub fn is_failed(&self) -> bool {
        matches!(self.kind, Kind::Failed(_))
    }

    /// Returns `true` if the task failed to register an I/O wait.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, Kind::Io(_))
    }
}
