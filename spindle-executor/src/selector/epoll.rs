//! A [`Readiness`] source backed by Linux `epoll`.
//!
//! Registrations use `EPOLLONESHOT`, so the kernel disarms a descriptor after
//! reporting it and re-registering re-arms it with `EPOLL_CTL_MOD`. The token
//! of a descriptor is its raw fd.
use std::collections::HashSet;
use std::io;
use std::ops::{Deref, DerefMut};
use std::os::fd::{AsRawFd, RawFd};

use log::{trace, warn};
use spindle_task::{Interest, Source, Token};

use super::{PollMode, Readiness};

const LOG: &str = "spindle_executor::selector::epoll";

/// An `epoll` instance.
pub struct Epoll {
    fd: RawFd,
    /// Descriptors currently added to the epoll set.
    added: HashSet<RawFd>,
    events: Vec<libc::epoll_event>,
}

impl std::fmt::Debug for Epoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Epoll")
            .field("fd", &self.fd)
            .field("added", &self.added.len())
            .field("max_events", &self.events.len())
            .finish()
    }
}

impl Epoll {
    /// Create a new epoll instance receiving up to `max_events` events per
    /// poll.
    pub fn new(max_events: usize) -> io::Result<Self> {
        // Safety: plain syscall, the returned descriptor is owned by `Epoll`.
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            fd,
            added: HashSet::new(),
            events: vec![libc::epoll_event { events: 0, u64: 0 }; max_events.max(1)],
        })
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, events: u32) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events,
            u64: fd as u64,
        };
        // Safety: `event` outlives the call and `self.fd` is a live epoll fd.
        let ret = unsafe { libc::epoll_ctl(self.fd, op, fd, &mut event) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

fn interest_to_events(interest: Interest) -> u32 {
    let events = match interest {
        Interest::Read => libc::EPOLLIN | libc::EPOLLRDHUP,
        Interest::Write => libc::EPOLLOUT,
    };
    (events | libc::EPOLLONESHOT) as u32
}

fn timeout_ms(mode: PollMode) -> libc::c_int {
    match mode {
        PollMode::NoWait => 0,
        PollMode::Wait(None) => -1,
        PollMode::Wait(Some(timeout)) => {
            // Round up so a sub-millisecond timeout still waits.
            let ms = timeout.as_nanos().div_ceil(1_000_000);
            ms.try_into().unwrap_or(libc::c_int::MAX)
        }
    }
}

impl Readiness for Epoll {
    fn register(&mut self, token: Token, interest: Interest) -> io::Result<()> {
        let fd = token.0 as RawFd;
        let events = interest_to_events(interest);
        if self.added.contains(&fd) {
            match self.ctl(libc::EPOLL_CTL_MOD, fd, events) {
                Ok(()) => {}
                // The descriptor was closed (and possibly reused) since it
                // was last added; the kernel already dropped it from the set.
                Err(err) if err.raw_os_error() == Some(libc::ENOENT) => {
                    self.ctl(libc::EPOLL_CTL_ADD, fd, events)?;
                }
                Err(err) => return Err(err),
            }
        } else {
            match self.ctl(libc::EPOLL_CTL_ADD, fd, events) {
                Ok(()) => {}
                Err(err) if err.raw_os_error() == Some(libc::EEXIST) => {
                    self.ctl(libc::EPOLL_CTL_MOD, fd, events)?;
                }
                Err(err) => return Err(err),
            }
            self.added.insert(fd);
        }
        trace!(target: LOG, "register fd={fd} {interest:?}");
        Ok(())
    }

    fn deregister(&mut self, token: Token) -> io::Result<()> {
        let fd = token.0 as RawFd;
        if !self.added.remove(&fd) {
            return Ok(());
        }
        // Safety: a null event is permitted for EPOLL_CTL_DEL.
        let ret = unsafe { libc::epoll_ctl(self.fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut()) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            // ENOENT / EBADF are expected if the fd was already closed.
            if err.raw_os_error() != Some(libc::ENOENT) && err.raw_os_error() != Some(libc::EBADF)
            {
                return Err(err);
            }
        }
        Ok(())
    }

    fn select(&mut self, mode: PollMode, ready: &mut Vec<Token>) -> io::Result<()> {
        let timeout = timeout_ms(mode);
        // Safety: `events` is a valid buffer of `events.len()` entries.
        let n = unsafe {
            libc::epoll_wait(
                self.fd,
                self.events.as_mut_ptr(),
                self.events.len() as libc::c_int,
                timeout,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                trace!(target: LOG, "select.eintr");
                return Ok(());
            }
            return Err(err);
        }

        for event in &self.events[..n as usize] {
            let data = event.u64;
            ready.push(Token(data as usize));
        }
        trace!(target: LOG, "select timeout={timeout} ready={n}");
        Ok(())
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        // Safety: `self.fd` is owned by this instance and closed exactly once.
        if unsafe { libc::close(self.fd) } < 0 {
            warn!(target: LOG, "close.failed {}", io::Error::last_os_error());
        }
    }
}

/// Makes any [`AsRawFd`] object usable as a [`Source`].
///
/// The wrapped object should be in non-blocking mode; reads and writes are
/// forwarded to it unchanged.
#[derive(Debug)]
pub struct Pollable<T> {
    inner: T,
}

impl<T: AsRawFd> Pollable<T> {
    /// Wrap `inner`.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Unwrap the inner object.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: AsRawFd> Source for Pollable<T> {
    fn token(&self) -> Token {
        Token(self.inner.as_raw_fd() as usize)
    }
}

impl<T> Deref for Pollable<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for Pollable<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: io::Read> io::Read for Pollable<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<T: io::Write> io::Write for Pollable<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
