//! Event sink system for observability.
//!
//! The scheduler emits one event per task lifecycle transition and one per
//! graph run. Event names:
//!
//! - `task.started`
//! - `task.succeeded`
//! - `task.cancelled` (the body ran and failed or stopped)
//! - `task.skipped` (short-circuited without running the body)
//! - `graph.completed`

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event emitted when a task body starts.
pub const TASK_STARTED: &str = "task.started";
/// Event emitted when a task body succeeds.
pub const TASK_SUCCEEDED: &str = "task.succeeded";
/// Event emitted when a task body fails, stops, or panics.
pub const TASK_CANCELLED: &str = "task.cancelled";
/// Event emitted when a task is cancelled without its body running.
pub const TASK_SKIPPED: &str = "task.skipped";
/// Event emitted when a graph run settles.
pub const GRAPH_COMPLETED: &str = "graph.completed";
