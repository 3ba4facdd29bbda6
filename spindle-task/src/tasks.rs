use std::collections::HashMap;

use crate::coroutine::{Outcome, Resume};
use crate::task::{Task, TaskId};

/// [`TaskSet`] owns the live tasks of a scheduler.
///
/// Inserting a task assigns it a fresh [`TaskId`]. Ids are never reused, so
/// once a task is removed its id stays dead.
pub struct TaskSet {
    tasks: HashMap<TaskId, Task>,
    next_id: u64,
}

impl std::fmt::Debug for TaskSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSet")
            .field("live", &self.tasks.len())
            .finish()
    }
}

impl TaskSet {
    /// Construct a new [`TaskSet`].
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            next_id: 0,
        }
    }

    /// Take ownership of `task` and return its id.
    pub fn insert(&mut self, task: Task) -> TaskId {
        let id = TaskId::from_raw(self.next_id);
        self.next_id += 1;
        self.tasks.insert(id, task);
        id
    }

    /// Returns `true` if `id` is a live task.
    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Returns the task's name, if it is live and named.
    pub fn name(&self, id: TaskId) -> Option<&str> {
        self.tasks.get(&id).and_then(Task::name)
    }

    /// Resume the task `id` with `input`.
    ///
    /// Returns `None` if `id` is not live. A task reporting a terminal
    /// outcome is removed from the set.
    pub fn resume(&mut self, id: TaskId, input: Resume) -> Option<Outcome> {
        let outcome = self.tasks.get_mut(&id)?.resume(input);
        if outcome.is_terminal() {
            self.tasks.remove(&id);
        }
        Some(outcome)
    }

    /// Remove a task without running it any further.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        self.tasks.remove(&id)
    }

    /// Drop every live task.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Returns the number of live tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if there are no live tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{coroutine, Message};

    #[test]
    fn ids_are_not_reused() {
        let mut set = TaskSet::new();
        let a = set.insert(Task::new(async {}));
        assert!(set.contains(a));
        assert!(matches!(set.resume(a, Resume::Empty), Some(Outcome::Completed)));
        assert!(!set.contains(a));

        let b = set.insert(Task::new(async {}));
        assert_ne!(a, b);
        assert!(set.resume(a, Resume::Empty).is_none());
    }

    #[test]
    fn suspended_task_stays_live() {
        let mut set = TaskSet::new();
        let id = set.insert(Task::from_coroutine(coroutine::from_fn(|_| {
            Outcome::Suspended(Message::Yield)
        })));
        assert!(matches!(
            set.resume(id, Resume::Empty),
            Some(Outcome::Suspended(Message::Yield))
        ));
        assert_eq!(set.len(), 1);
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn failed_task_is_removed() {
        let mut set = TaskSet::new();
        let id = set.insert(Task::new(async { panic!("nope") }));
        assert!(matches!(
            set.resume(id, Resume::Empty),
            Some(Outcome::Failed(_))
        ));
        assert!(!set.contains(id));
    }
}
