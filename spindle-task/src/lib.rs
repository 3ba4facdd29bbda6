//! Provides the task abstraction driven by the spindle scheduler.
//!
//! A task is a resumable unit of work. The scheduler advances it by calling
//! [`Task::resume`] with a [`Resume`] value and receives an [`Outcome`]: the task
//! either finished, failed, or suspended with a [`Message`] asking the scheduler
//! to do something on its behalf.
//!
//! Task bodies are usually written as `async` blocks using the primitives in
//! this crate ([`spawn`], [`join`], [`gather`], [`read`], [`write`], ...).
//! Explicit state machines can implement [`Coroutine`] directly.
//!
//! `spindle_task` is orientated towards a single-threaded event loop. Tasks
//! cannot be moved to, or resumed from, other threads.
//!
//! # Components
//! - [`Task`] and [`TaskId`]: the unit of work and its identity.
//! - [`Coroutine`], [`Outcome`], [`Message`], [`Resume`]: the resumption protocol.
//! - [`TaskSet`]: owns live tasks and hands out ids.
//! - [`Source`], [`Token`], [`Interest`]: the I/O handle abstraction.
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]
mod context;
pub mod coroutine;
mod error;
mod future;
mod io;
mod primitives;
mod task;
mod tasks;

pub use coroutine::{Coroutine, Message, Outcome, Resume};
pub use error::TaskError;
pub use io::{Interest, Source, Token};
pub use primitives::{
    gather, join, read, readable, spawn, spawn_task, writable, write, yield_now,
};
pub use task::{Task, TaskId};
pub use tasks::TaskSet;
