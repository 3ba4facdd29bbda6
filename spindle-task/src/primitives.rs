//! The vocabulary tasks use to talk to the scheduler.
//!
//! Every primitive suspends the calling task with a [`Message`] and completes
//! once the scheduler resumes it. They may only be awaited from within a task
//! driven by a spindle scheduler.
use std::future::Future;
use std::io;

use crate::coroutine::{Message, Resume};
use crate::future::Suspend;
use crate::io::{Interest, Source};
use crate::task::{Task, TaskId};

/// Spawn `future` as a new task and return its id.
///
/// The child is queued to run on the next iteration; the caller resumes
/// immediately with the child's id. The child keeps running even if nobody
/// joins it.
pub async fn spawn<F>(future: F) -> TaskId
where
    F: Future + 'static,
{
    spawn_task(Task::new(future)).await
}

/// Spawn an already constructed [`Task`] and return its id.
pub async fn spawn_task(task: Task) -> TaskId {
    match Suspend::new(Message::Spawn(task)).await {
        Resume::Spawned(id) => id,
        Resume::Empty => panic!("spawn resumed without a task id"),
    }
}

/// Wait until the task `id` has finished.
///
/// The task's result is not delivered; join only waits. Joining a task which
/// has already finished returns on the next iteration. A task that failed
/// still releases its joiners.
pub async fn join(id: TaskId) {
    Suspend::new(Message::Join(id)).await;
}

/// Spawn every task in `tasks`, then wait for all of them.
///
/// Tasks are spawned in order and joined in the same order. All children run
/// concurrently; the joins only decide when `gather` returns. An empty input
/// returns without suspending.
pub async fn gather<I>(tasks: I)
where
    I: IntoIterator<Item = Task>,
{
    let mut ids = Vec::new();
    for task in tasks {
        ids.push(spawn_task(task).await);
    }
    for id in ids {
        join(id).await;
    }
}

/// Give up the rest of this iteration. The task is re-queued unchanged.
pub async fn yield_now() {
    Suspend::new(Message::Yield).await;
}

/// Wait until `source` is ready to be read.
pub async fn readable<S>(source: &S)
where
    S: Source + ?Sized,
{
    Suspend::new(Message::IoWait(Interest::Read, source.token())).await;
}

/// Wait until `source` is ready to be written.
pub async fn writable<S>(source: &S)
where
    S: Source + ?Sized,
{
    Suspend::new(Message::IoWait(Interest::Write, source.token())).await;
}

/// Wait for `source` to become readable, then read from it once.
pub async fn read<S>(source: &mut S, buf: &mut [u8]) -> io::Result<usize>
where
    S: Source + io::Read + ?Sized,
{
    readable(&*source).await;
    source.read(buf)
}

/// Wait for `source` to become writable, then write to it once.
pub async fn write<S>(source: &mut S, buf: &[u8]) -> io::Result<usize>
where
    S: Source + io::Write + ?Sized,
{
    writable(&*source).await;
    source.write(buf)
}

#[cfg(test)]
mod tests {
    use std::pin::pin;
    use std::task::{Context, Poll};

    use super::*;
    use crate::{Outcome, Token};

    struct Fixed(Token);

    impl Source for Fixed {
        fn token(&self) -> Token {
            self.0
        }
    }

    #[test]
    fn empty_gather_does_not_suspend() {
        let mut fut = pin!(gather(Vec::new()));
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        assert!(matches!(fut.as_mut().poll(&mut cx), Poll::Ready(())));
    }

    #[test]
    fn readable_requests_read_interest() {
        let mut task = Task::new(async {
            readable(&Fixed(Token(3))).await;
        });
        let Outcome::Suspended(Message::IoWait(interest, token)) = task.resume(Resume::Empty)
        else {
            panic!("expected io wait");
        };
        assert_eq!(interest, Interest::Read);
        assert_eq!(token, Token(3));
        assert!(matches!(task.resume(Resume::Empty), Outcome::Completed));
    }

    #[test]
    fn join_requests_target() {
        let target = TaskId::from_raw(11);
        let mut task = Task::new(async move { join(target).await });
        assert!(matches!(
            task.resume(Resume::Empty),
            Outcome::Suspended(Message::Join(id)) if id == target
        ));
    }

    #[test]
    fn gather_spawns_in_order_then_joins() {
        let mut task = Task::new(gather(vec![
            Task::new(async {}).named("a"),
            Task::new(async {}).named("b"),
        ]));

        let mut names = Vec::new();
        for input in [Resume::Empty, Resume::Spawned(TaskId::from_raw(0))] {
            let Outcome::Suspended(Message::Spawn(child)) = task.resume(input) else {
                panic!("expected spawn");
            };
            names.push(child.name().map(str::to_owned));
        }
        assert_eq!(names, vec![Some("a".to_owned()), Some("b".to_owned())]);

        let Outcome::Suspended(Message::Join(first)) = task.resume(Resume::Spawned(TaskId::from_raw(1)))
        else {
            panic!("expected join");
        };
        assert_eq!(first, TaskId::from_raw(0));
        let Outcome::Suspended(Message::Join(second)) = task.resume(Resume::Empty) else {
            panic!("expected join");
        };
        assert_eq!(second, TaskId::from_raw(1));
        assert!(matches!(task.resume(Resume::Empty), Outcome::Completed));
    }
}
