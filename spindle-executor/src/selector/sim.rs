//! A simulated readiness source.
//!
//! Every [`SimStream`] counts down a number of poll cycles before it reports
//! ready. Each [`Readiness::select`] call decrements the countdown of every
//! registered stream by one; streams at or below zero are reported and
//! disarmed. The countdown does not reset, so a stream that became ready once
//! fires on the very next poll after it is registered again.
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::rc::{Rc, Weak};

use bytes::{Buf, Bytes, BytesMut};
use log::{debug, trace};
use spindle_task::{Interest, Source, Token};

use super::{PollMode, Readiness};

const LOG: &str = "spindle_executor::selector::sim";

/// A [`Readiness`] source driven by per-stream countdowns.
///
/// [`Simulated`] is a cheap handle; clones share the same streams. Hand one
/// clone to the scheduler and keep another to create streams.
///
/// ```rust
/// use spindle_executor::selector::Simulated;
/// use spindle_executor::Scheduler;
///
/// let sim = Simulated::new();
/// let mut scheduler = Scheduler::new(sim.clone());
/// let mut stream = sim.stream("A", 2);
/// stream.feed(b"hello");
///
/// let read = scheduler
///     .block_on(async move {
///         let mut buf = [0u8; 16];
///         let n = spindle_task::read(&mut stream, &mut buf).await.unwrap();
///         buf[..n].to_vec()
///     })
///     .unwrap();
/// assert_eq!(read, b"hello");
/// ```
#[derive(Clone, Default)]
pub struct Simulated {
    shared: Rc<Shared>,
}

#[derive(Default)]
struct Shared {
    next_token: Cell<usize>,
    streams: RefCell<HashMap<Token, Weak<StreamState>>>,
    /// Registered tokens in registration order.
    armed: RefCell<Vec<Token>>,
}

impl std::fmt::Debug for Simulated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulated")
            .field("armed", &self.shared.armed.borrow().len())
            .finish()
    }
}

impl Simulated {
    /// Create an empty simulated source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream which becomes ready after `wait_cycles` polls.
    ///
    /// A `wait_cycles` of zero or one is ready on the first poll.
    pub fn stream(&self, name: impl Into<String>, wait_cycles: u32) -> SimStream {
        let token = Token(self.shared.next_token.get());
        self.shared.next_token.set(token.0 + 1);

        let state = Rc::new(StreamState {
            token,
            name: name.into(),
            wait_cycles: Cell::new(i64::from(wait_cycles)),
            inbound: RefCell::new(BytesMut::new()),
            outbound: RefCell::new(BytesMut::new()),
        });
        self.shared
            .streams
            .borrow_mut()
            .insert(token, Rc::downgrade(&state));
        SimStream { state }
    }

    /// Returns the number of registered streams.
    pub fn armed(&self) -> usize {
        self.shared.armed.borrow().len()
    }
}

impl Readiness for Simulated {
    fn register(&mut self, token: Token, interest: Interest) -> io::Result<()> {
        let known = self
            .shared
            .streams
            .borrow()
            .get(&token)
            .is_some_and(|state| state.strong_count() > 0);
        if !known {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{token} is not a live simulated stream"),
            ));
        }

        let mut armed = self.shared.armed.borrow_mut();
        if !armed.contains(&token) {
            armed.push(token);
        }
        trace!(target: LOG, "register {token} {interest:?}");
        Ok(())
    }

    fn deregister(&mut self, token: Token) -> io::Result<()> {
        self.shared.armed.borrow_mut().retain(|armed| *armed != token);
        Ok(())
    }

    fn select(&mut self, _mode: PollMode, ready: &mut Vec<Token>) -> io::Result<()> {
        let mut streams = self.shared.streams.borrow_mut();
        self.shared.armed.borrow_mut().retain(|token| {
            let Some(state) = streams.get(token).and_then(Weak::upgrade) else {
                // The stream was dropped while registered.
                return false;
            };
            let remaining = state.wait_cycles.get() - 1;
            state.wait_cycles.set(remaining);
            if remaining <= 0 {
                ready.push(*token);
                false
            } else {
                true
            }
        });
        streams.retain(|_, state| state.strong_count() > 0);
        Ok(())
    }
}

struct StreamState {
    token: Token,
    name: String,
    wait_cycles: Cell<i64>,
    inbound: RefCell<BytesMut>,
    outbound: RefCell<BytesMut>,
}

/// An in-memory stream whose readiness is simulated by [`Simulated`].
///
/// Reads drain bytes previously supplied with [`SimStream::feed`]; reading an
/// empty stream returns `Ok(0)`. Writes are collected and can be inspected
/// with [`SimStream::written`]. Clones refer to the same stream.
#[derive(Clone)]
pub struct SimStream {
    state: Rc<StreamState>,
}

impl std::fmt::Debug for SimStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimStream")
            .field("name", &self.state.name)
            .field("token", &self.state.token)
            .finish()
    }
}

impl SimStream {
    /// Returns the stream's name.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Queue `data` to be returned by subsequent reads.
    pub fn feed(&self, data: &[u8]) {
        self.state.inbound.borrow_mut().extend_from_slice(data);
    }

    /// Returns everything written to the stream so far.
    pub fn written(&self) -> Bytes {
        Bytes::copy_from_slice(&self.state.outbound.borrow())
    }

    /// Remove and return everything written to the stream so far.
    pub fn take_written(&self) -> Bytes {
        self.state.outbound.borrow_mut().split().freeze()
    }

    /// Restart the countdown with `wait_cycles` more polls.
    pub fn reset(&self, wait_cycles: u32) {
        self.state.wait_cycles.set(i64::from(wait_cycles));
    }
}

impl Source for SimStream {
    fn token(&self) -> Token {
        self.state.token
    }
}

impl io::Read for SimStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inbound = self.state.inbound.borrow_mut();
        let n = buf.len().min(inbound.len());
        buf[..n].copy_from_slice(&inbound[..n]);
        inbound.advance(n);
        debug!(target: LOG, "stream.read {} {n}", self.state.name);
        Ok(n)
    }
}

impl io::Write for SimStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.outbound.borrow_mut().extend_from_slice(buf);
        debug!(target: LOG, "stream.write {} {}", self.state.name, buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
