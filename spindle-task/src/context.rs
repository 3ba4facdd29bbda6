use std::cell::Cell;

use crate::coroutine::{Message, Resume};

thread_local! {
    static CURRENT: Mailbox = const { Mailbox::new() };
}

/// Per-thread exchange between a future-backed task and the primitives it
/// awaits.
///
/// While a task is being resumed the mailbox holds the resume value (inbox)
/// and collects at most one suspension message (outbox).
pub(crate) struct Mailbox {
    active: Cell<bool>,
    inbox: Cell<Option<Resume>>,
    outbox: Cell<Option<Message>>,
}

impl Mailbox {
    const fn new() -> Self {
        Self {
            active: Cell::new(false),
            inbox: Cell::new(None),
            outbox: Cell::new(None),
        }
    }

    /// Open the mailbox for one resume of a task.
    pub(crate) fn enter(input: Resume) -> MailboxGuard {
        CURRENT.with(|current| {
            assert!(!current.active.get(), "task already running on this thread");
            current.active.set(true);
            current.inbox.set(Some(input));
        });
        MailboxGuard { _p: () }
    }

    /// Post a suspension message for the scheduler.
    ///
    /// ### Panics
    /// Panics outside of a running task, or if a message was already posted
    /// during this resume.
    pub(crate) fn post(message: Message) {
        CURRENT.with(|current| {
            assert!(
                current.active.get(),
                "scheduler primitive used outside of a spindle task"
            );
            let previous = current.outbox.replace(Some(message));
            assert!(
                previous.is_none(),
                "task posted more than one suspension message in a single resume"
            );
        })
    }

    /// Take the value the task was resumed with.
    pub(crate) fn take_input() -> Resume {
        CURRENT.with(|current| {
            assert!(
                current.active.get(),
                "scheduler primitive used outside of a spindle task"
            );
            current.inbox.take().unwrap_or_default()
        })
    }
}

#[derive(Debug)]
pub(crate) struct MailboxGuard {
    _p: (),
}

impl MailboxGuard {
    /// Take the message posted during this resume, if any.
    pub(crate) fn take_message(&self) -> Option<Message> {
        CURRENT.with(|current| current.outbox.take())
    }
}

impl Drop for MailboxGuard {
    fn drop(&mut self) {
        let leftover = CURRENT.with(|current| {
            current.active.set(false);
            current.inbox.set(None);
            current.outbox.take()
        });
        // Only a panicking task leaves a message behind. It may own a task,
        // so it is dropped outside of `with`.
        drop(leftover);
    }
}
