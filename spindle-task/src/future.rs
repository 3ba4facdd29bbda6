//! Adapts a [`Future`] to the [`Coroutine`] protocol.
//!
//! Every resume polls the future exactly once. The primitives the body awaits
//! talk to the scheduler through the thread-local mailbox: on their first poll
//! they post a [`Message`] and return `Pending`, on the next poll they read the
//! resume value.
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::context::Mailbox;
use crate::coroutine::{Coroutine, Message, Outcome, Resume};
use crate::error::TaskError;

pub(crate) struct FutureCoroutine {
    future: Pin<Box<dyn Future<Output = ()>>>,
}

impl FutureCoroutine {
    pub(crate) fn new<F>(future: F) -> Self
    where
        F: Future + 'static,
    {
        let future = async move {
            let _ = future.await;
        };
        Self {
            future: Box::pin(future),
        }
    }
}

impl Coroutine for FutureCoroutine {
    fn resume(&mut self, input: Resume) -> Outcome {
        let guard = Mailbox::enter(input);
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        match self.future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => match guard.take_message() {
                None => Outcome::Completed,
                // A primitive was polled once and then abandoned; whatever it
                // asked for (possibly a child task) would be lost silently.
                Some(message) => Outcome::Failed(TaskError::failed(format!(
                    "task completed with an undelivered {message:?} request"
                ))),
            },
            // A future pending on something other than a primitive is treated
            // as a voluntary yield.
            Poll::Pending => Outcome::Suspended(guard.take_message().unwrap_or(Message::Yield)),
        }
    }
}

/// Future returned by the primitives: posts `message` on the first poll and
/// completes with the resume value on the second.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub(crate) struct Suspend {
    message: Option<Message>,
}

impl Suspend {
    pub(crate) fn new(message: Message) -> Self {
        Self {
            message: Some(message),
        }
    }
}

impl Future for Suspend {
    type Output = Resume;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.message.take() {
            Some(message) => {
                Mailbox::post(message);
                Poll::Pending
            }
            None => Poll::Ready(Mailbox::take_input()),
        }
    }
}
