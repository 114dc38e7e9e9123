//! Task graph execution engine.
//!
//! Tasks start as soon as every predecessor has settled, up to a bounded
//! number at a time. Before a task starts, the scheduler checks its own token
//! and its predecessors: if either says "cancelled", the task is settled as
//! cancelled without running its body, and its successors see that in turn.

use super::result_context::panic_message;
use super::{ResultContext, Task, TaskContext, TaskId, TaskSpec};
use crate::cancellation::CancellationToken;
use crate::core::{CancelReason, TaskOutcome, TaskStatus};
use crate::errors::{ConfigurationCode, ConfigurationError};
use crate::events::{
    EventSink, NoOpEventSink, GRAPH_COMPLETED, TASK_CANCELLED, TASK_SKIPPED, TASK_STARTED,
    TASK_SUCCEEDED,
};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default number of task bodies allowed to run at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug)]
struct Node {
    task: Arc<dyn Task>,
    predecessors: Vec<TaskId>,
    on_result_context: bool,
    always_run: bool,
    token: Arc<CancellationToken>,
}

/// A dependency graph of tasks for one pipeline invocation.
pub struct TaskGraph {
    name: String,
    nodes: Vec<Node>,
    max_concurrency: usize,
    result_context: Option<Arc<ResultContext>>,
    sink: Arc<dyn EventSink>,
}

impl TaskGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            result_context: None,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Bounds how many task bodies run at once (minimum 1).
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Sets the context that runs tasks registered with `on_result_context`.
    #[must_use]
    pub fn with_result_context(mut self, context: Arc<ResultContext>) -> Self {
        self.result_context = Some(context);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.nodes.len()
    }

    /// Registers a task behind the given predecessors. Does not start it.
    ///
    /// # Errors
    ///
    /// Returns an error if a predecessor is not part of this graph.
    pub fn schedule(
        &mut self,
        task: impl Task + 'static,
        predecessors: &[TaskId],
    ) -> Result<TaskId, ConfigurationError> {
        self.add(TaskSpec::new(Arc::new(task)).with_predecessors(predecessors.iter().copied()))
    }

    /// Registers a task from a full spec. Does not start it.
    ///
    /// # Errors
    ///
    /// Returns an error if a predecessor is not part of this graph.
    pub fn add(&mut self, spec: TaskSpec) -> Result<TaskId, ConfigurationError> {
        let mut predecessors: Vec<TaskId> = Vec::with_capacity(spec.predecessors.len());
        for pred in spec.predecessors {
            self.check_known(pred)?;
            if !predecessors.contains(&pred) {
                predecessors.push(pred);
            }
        }

        let id = TaskId(self.nodes.len());
        debug!(graph = %self.name, task = %spec.task.name(), id = %id, "Task scheduled");
        self.nodes.push(Node {
            task: spec.task,
            predecessors,
            on_result_context: spec.on_result_context,
            always_run: spec.always_run,
            token: Arc::new(CancellationToken::new()),
        });
        Ok(id)
    }

    /// Adds the edge "`task` waits for `predecessor`" after registration.
    ///
    /// # Errors
    ///
    /// Returns an error if either id is unknown, the edge is a self loop, or
    /// the edge would close a cycle.
    pub fn add_dependency(
        &mut self,
        task: TaskId,
        predecessor: TaskId,
    ) -> Result<(), ConfigurationError> {
        self.check_known(task)?;
        self.check_known(predecessor)?;
        if task == predecessor {
            let name = self.task_name(task).to_string();
            return Err(ConfigurationError::new(
                ConfigurationCode::GraphSelfDependency,
                format!("Task '{name}' cannot depend on itself"),
            )
            .with_tasks(vec![name]));
        }
        if self.nodes[task.0].predecessors.contains(&predecessor) {
            return Ok(());
        }
        if let Some(path) = self.path_between(predecessor, task) {
            let mut names: Vec<String> = path
                .iter()
                .map(|id| self.task_name(*id).to_string())
                .collect();
            names.push(self.task_name(predecessor).to_string());
            return Err(ConfigurationError::cycle(names));
        }

        self.nodes[task.0].predecessors.push(predecessor);
        Ok(())
    }

    /// Cancels a task before or while the graph runs.
    ///
    /// Tasks registered with `always_run` cannot be cancelled; the request is
    /// ignored for them.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is not part of this graph.
    pub fn cancel(
        &self,
        task: TaskId,
        reason: impl Into<String>,
    ) -> Result<(), ConfigurationError> {
        self.check_known(task)?;
        let node = &self.nodes[task.0];
        if !node.always_run {
            node.token.cancel(reason);
        }
        Ok(())
    }

    /// Returns a handle that can cancel tasks once the graph is running.
    #[must_use]
    pub fn handle(&self) -> GraphHandle {
        GraphHandle {
            tasks: Arc::new(
                self.nodes
                    .iter()
                    .map(|node| (Arc::clone(&node.token), node.always_run))
                    .collect(),
            ),
        }
    }

    /// Runs every task to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error if a task targets the result context but none is
    /// configured, or if the scheduler cannot make progress.
    pub async fn run(self) -> Result<GraphReport, ConfigurationError> {
        let start = Instant::now();
        if self.result_context.is_none() {
            if let Some(node) = self.nodes.iter().find(|node| node.on_result_context) {
                return Err(ConfigurationError::new(
                    ConfigurationCode::GraphNoResultContext,
                    format!(
                        "Task '{}' targets the result context but graph '{}' has none",
                        node.task.name(),
                        self.name
                    ),
                )
                .with_tasks(vec![node.task.name().to_string()]));
            }
        }

        let total = self.nodes.len();
        let mut statuses = vec![TaskStatus::Pending; total];
        let mut waiting: Vec<usize> = self.nodes.iter().map(|n| n.predecessors.len()).collect();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); total];
        for (idx, node) in self.nodes.iter().enumerate() {
            for pred in &node.predecessors {
                successors[pred.0].push(idx);
            }
        }

        let mut ready: VecDeque<usize> = (0..total).filter(|idx| waiting[*idx] == 0).collect();
        let mut active: FuturesUnordered<BoxFuture<'static, (usize, TaskStatus)>> =
            FuturesUnordered::new();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut settled = 0;

        debug!(graph = %self.name, tasks = total, "Graph run started");

        while settled < total {
            while let Some(idx) = ready.pop_front() {
                if let Some(reason) = self.short_circuit(idx, &statuses) {
                    self.emit_skipped(idx, &reason);
                    debug!(
                        graph = %self.name,
                        task = %self.nodes[idx].task.name(),
                        reason = %reason,
                        "Task skipped"
                    );
                    statuses[idx] = TaskStatus::Cancelled(reason);
                    settled += 1;
                    release(idx, &successors, &mut waiting, &mut ready);
                    continue;
                }

                statuses[idx] = TaskStatus::Running;
                active.push(self.spawn_task(idx, Arc::clone(&semaphore)));
            }

            if settled == total {
                break;
            }

            let Some((idx, status)) = active.next().await else {
                let pending: Vec<String> = statuses
                    .iter()
                    .enumerate()
                    .filter(|(_, status)| !status.is_terminal())
                    .map(|(idx, _)| self.nodes[idx].task.name().to_string())
                    .collect();
                return Err(ConfigurationError::new(
                    ConfigurationCode::GraphStalled,
                    format!("Graph '{}' stalled with {} unsettled tasks", self.name, pending.len()),
                )
                .with_tasks(pending));
            };

            statuses[idx] = status;
            settled += 1;
            release(idx, &successors, &mut waiting, &mut ready);
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let cancelled = statuses.iter().filter(|s| s.is_cancelled()).count();
        self.sink.try_emit(
            GRAPH_COMPLETED,
            Some(serde_json::json!({
                "graph": &self.name,
                "tasks": total,
                "cancelled": cancelled,
                "duration_ms": duration_ms,
            })),
        );
        debug!(graph = %self.name, cancelled, duration_ms, "Graph run completed");

        Ok(GraphReport {
            name: self.name,
            tasks: self
                .nodes
                .iter()
                .map(|node| node.task.name().to_string())
                .zip(statuses)
                .collect(),
            duration_ms,
        })
    }

    fn short_circuit(&self, idx: usize, statuses: &[TaskStatus]) -> Option<CancelReason> {
        let node = &self.nodes[idx];
        if node.token.is_cancelled() {
            return Some(CancelReason::Explicit(node.token.reason().unwrap_or_default()));
        }
        if node.always_run {
            return None;
        }
        let cancelled_pred = node
            .predecessors
            .iter()
            .find(|pred| statuses[pred.0].is_cancelled())?;
        let name = self.task_name(*cancelled_pred).to_string();
        node.token.cancel(format!("predecessor '{name}' cancelled"));
        Some(CancelReason::Predecessor(name))
    }

    /// Spawns a future that runs one task body and reports its status.
    fn spawn_task(
        &self,
        idx: usize,
        semaphore: Arc<Semaphore>,
    ) -> BoxFuture<'static, (usize, TaskStatus)> {
        let node = &self.nodes[idx];
        let task = Arc::clone(&node.task);
        let token = Arc::clone(&node.token);
        let ctx = TaskContext::new(
            self.name.clone(),
            task.name(),
            TaskId(idx),
            Arc::clone(&token),
        );
        let result_context = if node.on_result_context {
            self.result_context.clone()
        } else {
            None
        };
        let sink = Arc::clone(&self.sink);
        let graph = self.name.clone();

        async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                let reason = CancelReason::Explicit("scheduler closed".into());
                return (idx, TaskStatus::Cancelled(reason));
            };

            let name = task.name().to_string();
            sink.try_emit(
                TASK_STARTED,
                Some(serde_json::json!({ "graph": &graph, "task": &name, "kind": task.kind() })),
            );
            let started = Instant::now();

            let outcome = match result_context {
                Some(context) => context.execute(task, ctx).await,
                None => match tokio::spawn(async move { task.execute(&ctx).await }).await {
                    Ok(outcome) => Ok(outcome),
                    Err(e) if e.is_panic() => {
                        Err(CancelReason::Panicked(panic_message(e.into_panic().as_ref())))
                    }
                    Err(e) => Err(CancelReason::Explicit(e.to_string())),
                },
            };
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            let status = match outcome {
                Ok(TaskOutcome::Succeeded) if token.is_cancelled() => TaskStatus::Cancelled(
                    CancelReason::Explicit(token.reason().unwrap_or_default()),
                ),
                Ok(TaskOutcome::Succeeded) => TaskStatus::Succeeded,
                Ok(TaskOutcome::Failed(err)) => TaskStatus::Cancelled(CancelReason::Failed(err)),
                Ok(TaskOutcome::Cancelled(reason)) => {
                    TaskStatus::Cancelled(CancelReason::Explicit(reason))
                }
                Err(reason) => TaskStatus::Cancelled(reason),
            };

            match status.cancel_reason() {
                None => sink.try_emit(
                    TASK_SUCCEEDED,
                    Some(serde_json::json!({
                        "graph": &graph,
                        "task": &name,
                        "duration_ms": duration_ms,
                    })),
                ),
                Some(reason) => {
                    if matches!(reason, CancelReason::Failed(_) | CancelReason::Panicked(_)) {
                        warn!(graph = %graph, task = %name, reason = %reason, "Task failed");
                    }
                    sink.try_emit(
                        TASK_CANCELLED,
                        Some(serde_json::json!({
                            "graph": &graph,
                            "task": &name,
                            "reason": reason.to_string(),
                            "duration_ms": duration_ms,
                        })),
                    );
                }
            }

            (idx, status)
        }
        .boxed()
    }

    fn emit_skipped(&self, idx: usize, reason: &CancelReason) {
        self.sink.try_emit(
            TASK_SKIPPED,
            Some(serde_json::json!({
                "graph": &self.name,
                "task": self.nodes[idx].task.name(),
                "reason": reason.to_string(),
            })),
        );
    }

    fn check_known(&self, id: TaskId) -> Result<(), ConfigurationError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(ConfigurationError::unknown_task(id.0))
        }
    }

    fn task_name(&self, id: TaskId) -> &str {
        self.nodes[id.0].task.name()
    }

    /// Finds a predecessor chain from `from` back to `to`, if one exists.
    fn path_between(&self, from: TaskId, to: TaskId) -> Option<Vec<TaskId>> {
        let mut visited = vec![false; self.nodes.len()];
        let mut path = Vec::new();
        self.visit(from, to, &mut visited, &mut path).then_some(path)
    }

    fn visit(
        &self,
        node: TaskId,
        target: TaskId,
        visited: &mut [bool],
        path: &mut Vec<TaskId>,
    ) -> bool {
        if visited[node.0] {
            return false;
        }
        visited[node.0] = true;
        path.push(node);
        if node == target {
            return true;
        }
        for pred in &self.nodes[node.0].predecessors {
            if self.visit(*pred, target, visited, path) {
                return true;
            }
        }
        path.pop();
        false
    }
}

fn release(
    idx: usize,
    successors: &[Vec<usize>],
    waiting: &mut [usize],
    ready: &mut VecDeque<usize>,
) {
    for succ in &successors[idx] {
        waiting[*succ] = waiting[*succ].saturating_sub(1);
        if waiting[*succ] == 0 {
            ready.push_back(*succ);
        }
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("max_concurrency", &self.max_concurrency)
            .field("result_context", &self.result_context)
            .finish_non_exhaustive()
    }
}

/// Cancels tasks of a graph that may already be running.
#[derive(Debug, Clone, Default)]
pub struct GraphHandle {
    tasks: Arc<Vec<(Arc<CancellationToken>, bool)>>,
}

impl GraphHandle {
    /// Cancels one task. Unknown ids and `always_run` tasks are ignored.
    pub fn cancel(&self, task: TaskId, reason: impl Into<String>) {
        if let Some((token, false)) = self.tasks.get(task.0) {
            token.cancel(reason);
        }
    }

    /// Cancels every task except those registered with `always_run`.
    pub fn cancel_all(&self, reason: impl Into<String>) {
        let reason = reason.into();
        for (token, always_run) in self.tasks.iter() {
            if !always_run {
                token.cancel(reason.clone());
            }
        }
    }
}

/// Terminal state of every task after a graph run.
#[derive(Debug, Clone)]
pub struct GraphReport {
    /// The graph name.
    pub name: String,
    /// Task names and final statuses, in registration order.
    pub tasks: Vec<(String, TaskStatus)>,
    /// Total run time in milliseconds.
    pub duration_ms: f64,
}

impl GraphReport {
    /// Final status of a task.
    #[must_use]
    pub fn status(&self, task: TaskId) -> Option<&TaskStatus> {
        self.tasks.get(task.0).map(|(_, status)| status)
    }

    /// Final status of the first task with the given name.
    #[must_use]
    pub fn status_of(&self, name: &str) -> Option<&TaskStatus> {
        self.tasks
            .iter()
            .find(|(task, _)| task == name)
            .map(|(_, status)| status)
    }

    /// Returns true if every task succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.tasks.iter().all(|(_, status)| *status == TaskStatus::Succeeded)
    }

    /// Number of tasks that ended cancelled.
    #[must_use]
    pub fn cancelled_count(&self) -> usize {
        self.tasks.iter().filter(|(_, status)| status.is_cancelled()).count()
    }
}
