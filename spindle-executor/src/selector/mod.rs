//! Contains the [`Selector`] and the [`Readiness`] trait.
//!
//! The [`Scheduler`] hands tasks waiting on I/O to a [`Selector`], which
//! remembers exactly one waiter per handle. Whether a handle is ready is
//! decided by a pluggable [`Readiness`] source.
//!
//! Registrations fire once: after a handle has been reported ready its waiter
//! is removed and the handle must be registered again to fire again.
//!
//! [`Scheduler`]: crate::Scheduler
use std::collections::HashMap;
use std::io;
use std::time::Duration;

use log::{trace, warn};
use spindle_task::{Interest, TaskId, Token};

#[cfg(target_os = "linux")]
mod epoll;
mod sim;

#[cfg(target_os = "linux")]
pub use epoll::{Epoll, Pollable};
pub use sim::{SimStream, Simulated};

const LOG: &str = "spindle_executor::selector";

/// Indicates how long a [`Readiness::select`] call may wait.
///
/// It is always valid to return early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Report what is ready right now and return immediately.
    NoWait,

    /// Wait for at least one registered handle to become ready, or until
    /// the timeout elapses. `None` waits indefinitely.
    Wait(Option<Duration>),
}

/// The policy deciding when registered handles are ready.
///
/// A [`Readiness`] source sees every registration the [`Selector`] makes and
/// reports ready tokens from [`Readiness::select`]. A reported token is
/// considered disarmed until it is registered again.
pub trait Readiness {
    /// Start watching `token` for `interest`, replacing any earlier interest.
    fn register(&mut self, token: Token, interest: Interest) -> io::Result<()>;

    /// Stop watching `token`.
    fn deregister(&mut self, token: Token) -> io::Result<()>;

    /// Push every ready token onto `ready`.
    ///
    /// Sources must respect the [`PollMode`] passed to this method.
    fn select(&mut self, mode: PollMode, ready: &mut Vec<Token>) -> io::Result<()>;
}

impl<R> Readiness for Box<R>
where
    R: Readiness + ?Sized,
{
    fn register(&mut self, token: Token, interest: Interest) -> io::Result<()> {
        (**self).register(token, interest)
    }

    fn deregister(&mut self, token: Token) -> io::Result<()> {
        (**self).deregister(token)
    }

    fn select(&mut self, mode: PollMode, ready: &mut Vec<Token>) -> io::Result<()> {
        (**self).select(mode, ready)
    }
}

/// A handle reported ready together with the task waiting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// The ready handle.
    pub token: Token,
    /// The interest the task registered.
    pub interest: Interest,
    /// The task to wake.
    pub task: TaskId,
}

#[derive(Debug, Clone, Copy)]
struct Waiter {
    interest: Interest,
    task: TaskId,
}

/// Tracks which task waits on which handle.
///
/// At most one task waits on a handle at any time. Registering a handle that
/// already has a waiter replaces it.
#[derive(Debug)]
pub struct Selector<R> {
    readiness: R,
    waiters: HashMap<Token, Waiter>,
    ready: Vec<Token>,
}

impl<R: Readiness> Selector<R> {
    /// Construct a new [`Selector`] on top of `readiness`.
    pub fn new(readiness: R) -> Self {
        Self {
            readiness,
            waiters: HashMap::new(),
            ready: Vec::new(),
        }
    }

    /// Record that `task` waits for `interest` on `token`.
    ///
    /// Returns the task previously waiting on `token`, which will not be
    /// woken by this selector anymore.
    pub fn register(
        &mut self,
        token: Token,
        interest: Interest,
        task: TaskId,
    ) -> io::Result<Option<TaskId>> {
        self.readiness.register(token, interest)?;
        let previous = self.waiters.insert(token, Waiter { interest, task });
        let displaced = previous.map(|waiter| waiter.task);
        if let Some(displaced) = displaced {
            warn!(target: LOG, "register.displaced {token} {displaced} => {task}");
        } else {
            trace!(target: LOG, "register {token} {interest:?} {task}");
        }
        Ok(displaced)
    }

    /// Remove and return every registration whose handle is ready.
    ///
    /// Registrations which are not ready stay in place.
    pub fn poll(&mut self, mode: PollMode) -> io::Result<Vec<Event>> {
        self.ready.clear();
        self.readiness.select(mode, &mut self.ready)?;

        let mut events = Vec::with_capacity(self.ready.len());
        for token in self.ready.drain(..) {
            // Sources may report tokens nobody waits on anymore.
            if let Some(waiter) = self.waiters.remove(&token) {
                events.push(Event {
                    token,
                    interest: waiter.interest,
                    task: waiter.task,
                });
            }
        }
        trace!(target: LOG, "poll {mode:?} ready={}", events.len());
        Ok(events)
    }

    /// Returns the number of handles with a waiter.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Returns `true` if no task is waiting on I/O.
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Forget every waiter and deregister their handles.
    pub(crate) fn clear(&mut self) {
        for (token, _) in self.waiters.drain() {
            if let Err(err) = self.readiness.deregister(token) {
                warn!(target: LOG, "clear.deregister.failed {token} {err}");
            }
        }
    }

    /// Returns a reference to the readiness source.
    pub fn readiness(&self) -> &R {
        &self.readiness
    }

    /// Returns a mutable reference to the readiness source.
    pub fn readiness_mut(&mut self) -> &mut R {
        &mut self.readiness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reports exactly the tokens it was told are ready.
    #[derive(Debug, Default)]
    struct Manual {
        ready: Vec<Token>,
        registered: Vec<(Token, Interest)>,
    }

    impl Readiness for Manual {
        fn register(&mut self, token: Token, interest: Interest) -> io::Result<()> {
            self.registered.push((token, interest));
            Ok(())
        }

        fn deregister(&mut self, _token: Token) -> io::Result<()> {
            Ok(())
        }

        fn select(&mut self, _mode: PollMode, ready: &mut Vec<Token>) -> io::Result<()> {
            ready.append(&mut self.ready);
            Ok(())
        }
    }

    fn task(raw: u64) -> TaskId {
        TaskId::from_raw(raw)
    }

    #[test]
    fn poll_removes_ready_registrations() {
        let mut selector = Selector::new(Manual::default());
        selector.register(Token(1), Interest::Read, task(0)).unwrap();
        selector.register(Token(2), Interest::Write, task(1)).unwrap();
        assert_eq!(selector.len(), 2);

        selector.readiness_mut().ready.push(Token(2));
        let events = selector.poll(PollMode::NoWait).unwrap();
        assert_eq!(
            events,
            vec![Event {
                token: Token(2),
                interest: Interest::Write,
                task: task(1),
            }]
        );
        assert_eq!(selector.len(), 1);

        // Fires once: the same token reported again has no waiter.
        selector.readiness_mut().ready.push(Token(2));
        assert!(selector.poll(PollMode::NoWait).unwrap().is_empty());
        assert_eq!(selector.len(), 1);
    }

    #[test]
    fn last_registration_wins() {
        let mut selector = Selector::new(Manual::default());
        assert_eq!(
            selector.register(Token(5), Interest::Read, task(0)).unwrap(),
            None
        );
        assert_eq!(
            selector.register(Token(5), Interest::Write, task(1)).unwrap(),
            Some(task(0))
        );
        assert_eq!(selector.len(), 1);
        assert_eq!(
            selector.readiness().registered,
            vec![(Token(5), Interest::Read), (Token(5), Interest::Write)]
        );

        selector.readiness_mut().ready.push(Token(5));
        let events = selector.poll(PollMode::NoWait).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].task, task(1));
        assert_eq!(events[0].interest, Interest::Write);
        assert!(selector.is_empty());
    }

    #[test]
    fn registration_error_keeps_previous_waiter() {
        #[derive(Debug)]
        struct Refuse;

        impl Readiness for Refuse {
            fn register(&mut self, _: Token, _: Interest) -> io::Result<()> {
                Err(io::Error::other("refused"))
            }

            fn deregister(&mut self, _: Token) -> io::Result<()> {
                Ok(())
            }

            fn select(&mut self, _: PollMode, _: &mut Vec<Token>) -> io::Result<()> {
                Ok(())
            }
        }

        let mut selector = Selector::new(Refuse);
        assert!(selector.register(Token(1), Interest::Read, task(0)).is_err());
        assert!(selector.is_empty());
    }
}
