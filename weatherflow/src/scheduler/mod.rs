//! Task scheduling.
//!
//! A [`TaskGraph`] holds the tasks of one pipeline invocation and the edges
//! between them. [`TaskGraph::run`] drives every task to a terminal
//! [`TaskStatus`](crate::core::TaskStatus), running independent tasks
//! concurrently on the Tokio pool and handoff tasks on a [`ResultContext`].

mod graph;
mod result_context;
mod spec;
mod task;

pub use graph::{GraphHandle, GraphReport, TaskGraph, DEFAULT_MAX_CONCURRENCY};
pub use result_context::ResultContext;
pub use spec::{TaskId, TaskSpec};
pub use task::{FnTask, SentinelTask, Task, TaskContext};
