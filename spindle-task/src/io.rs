use std::fmt;
use std::rc::Rc;

/// Identifies an I/O handle to the scheduler's selector.
///
/// What a token means is up to the readiness source the scheduler runs on.
/// The epoll source uses the file descriptor, the simulated source hands out
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub usize);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token-{}", self.0)
    }
}

/// The kind of readiness a task waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    /// The handle can be read without blocking.
    Read,
    /// The handle can be written without blocking.
    Write,
}

/// An object the scheduler can wait on for readiness.
///
/// Reads and writes on a [`Source`] are only attempted after the selector has
/// reported it ready, so they are expected not to block.
pub trait Source {
    /// The token identifying this handle.
    fn token(&self) -> Token;
}

impl Source for Token {
    fn token(&self) -> Token {
        *self
    }
}

impl<T> Source for &T
where
    T: Source + ?Sized,
{
    fn token(&self) -> Token {
        (**self).token()
    }
}

impl<T> Source for &mut T
where
    T: Source + ?Sized,
{
    fn token(&self) -> Token {
        (**self).token()
    }
}

impl<T> Source for Rc<T>
where
    T: Source + ?Sized,
{
    fn token(&self) -> Token {
        (**self).token()
    }
}
