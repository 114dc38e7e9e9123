//! Task identifiers and registration specs.

use super::Task;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of a task inside one [`TaskGraph`](super::TaskGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Position of the task in registration order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Specification for registering a task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// The task implementation.
    pub task: Arc<dyn Task>,
    /// Tasks that must settle before this one starts.
    pub predecessors: Vec<TaskId>,
    /// Run the body on the graph's result context instead of the worker pool.
    pub on_result_context: bool,
    /// Run the body even when a predecessor was cancelled.
    pub always_run: bool,
}

impl TaskSpec {
    /// Creates a new task specification.
    #[must_use]
    pub fn new(task: Arc<dyn Task>) -> Self {
        Self {
            task,
            predecessors: Vec::new(),
            on_result_context: false,
            always_run: false,
        }
    }

    /// Sets the predecessors.
    #[must_use]
    pub fn with_predecessors(mut self, predecessors: impl IntoIterator<Item = TaskId>) -> Self {
        self.predecessors = predecessors.into_iter().collect();
        self
    }

    /// Adds a predecessor.
    #[must_use]
    pub fn with_predecessor(mut self, predecessor: TaskId) -> Self {
        self.predecessors.push(predecessor);
        self
    }

    /// Targets the graph's result context.
    #[must_use]
    pub fn on_result_context(mut self) -> Self {
        self.on_result_context = true;
        self
    }

    /// Exempts the task from predecessor short-circuiting.
    ///
    /// Handoff tasks use this so they observe the settled state of the
    /// pipeline however it ended.
    #[must_use]
    pub fn always_run(mut self) -> Self {
        self.always_run = true;
        self
    }
}
