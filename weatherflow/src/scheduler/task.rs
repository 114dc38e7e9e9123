//! Task trait and simple implementations.
//!
//! Tasks are the schedulable units of a [`TaskGraph`](super::TaskGraph).
//! They never raise: a body reports its result as a [`TaskOutcome`] after
//! recording any failure in the buffers it was constructed with.

use super::TaskId;
use crate::cancellation::CancellationToken;
use crate::core::{TaskKind, TaskOutcome};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for schedulable tasks.
#[async_trait]
pub trait Task: Send + Sync + Debug {
    /// Returns the name of the task.
    fn name(&self) -> &str;

    /// Returns the kind of work the task performs.
    fn kind(&self) -> TaskKind {
        TaskKind::Custom
    }

    /// Executes the task body.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The execution context, carrying the task's cancellation token
    async fn execute(&self, ctx: &TaskContext) -> TaskOutcome;
}

/// Per-execution context handed to a task body.
#[derive(Debug, Clone)]
pub struct TaskContext {
    graph: String,
    task: String,
    id: TaskId,
    token: Arc<CancellationToken>,
}

impl TaskContext {
    /// Creates a new task context.
    #[must_use]
    pub fn new(
        graph: impl Into<String>,
        task: impl Into<String>,
        id: TaskId,
        token: Arc<CancellationToken>,
    ) -> Self {
        Self {
            graph: graph.into(),
            task: task.into(),
            id,
            token,
        }
    }

    /// Creates a context outside any graph, with a fresh token.
    #[must_use]
    pub fn detached(task: impl Into<String>) -> Self {
        Self::new("detached", task, TaskId(0), Arc::new(CancellationToken::new()))
    }

    /// Name of the graph running the task.
    #[must_use]
    pub fn graph(&self) -> &str {
        &self.graph
    }

    /// Name of the running task.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Identifier of the running task.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The task's cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns whether the task has been asked to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A simple function-based task.
pub struct FnTask<F>
where
    F: Fn(&TaskContext) -> TaskOutcome + Send + Sync,
{
    name: String,
    kind: TaskKind,
    func: F,
}

impl<F> FnTask<F>
where
    F: Fn(&TaskContext) -> TaskOutcome + Send + Sync,
{
    /// Creates a new function-based task.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            kind: TaskKind::Custom,
            func,
        }
    }

    /// Sets the task kind.
    #[must_use]
    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        self.kind = kind;
        self
    }
}

impl<F> Debug for FnTask<F>
where
    F: Fn(&TaskContext) -> TaskOutcome + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

#[async_trait]
impl<F> Task for FnTask<F>
where
    F: Fn(&TaskContext) -> TaskOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        self.kind
    }

    async fn execute(&self, ctx: &TaskContext) -> TaskOutcome {
        (self.func)(ctx)
    }
}

/// A task with an empty body.
///
/// Useful as a gate: cancel the sentinel before the graph runs and every
/// task depending on it is short-circuited.
#[derive(Debug, Clone)]
pub struct SentinelTask {
    name: String,
}

impl SentinelTask {
    /// Creates a new sentinel task.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Task for SentinelTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &TaskContext) -> TaskOutcome {
        TaskOutcome::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_task() {
        let task = FnTask::new("double", |_ctx| TaskOutcome::Succeeded).with_kind(TaskKind::Map);

        assert_eq!(task.name(), "double");
        assert_eq!(task.kind(), TaskKind::Map);

        let ctx = TaskContext::detached("double");
        assert!(task.execute(&ctx).await.is_success());
    }

    #[tokio::test]
    async fn test_sentinel_task() {
        let task = SentinelTask::new("gate");
        let ctx = TaskContext::detached("gate");

        assert_eq!(task.kind(), TaskKind::Custom);
        assert_eq!(task.execute(&ctx).await, TaskOutcome::Succeeded);
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.graph(), "detached");
    }
}
