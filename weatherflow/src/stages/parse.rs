//! Maps records to in-memory values.

use super::record_failure;
use crate::buffers::{ErrorAccumulator, SharedList};
use crate::core::{TaskKind, TaskOutcome};
use crate::errors::Result;
use crate::mapping::Mapper;
use crate::scheduler::{Task, TaskContext};
use async_trait::async_trait;
use serde_json::Value;

/// Applies a [`Mapper`] to every record.
///
/// Stops at the first failing record; on failure nothing is appended.
pub struct ParseTask<M: Mapper> {
    name: String,
    mapper: M,
    input: SharedList<Value>,
    output: SharedList<M::Output>,
    errors: ErrorAccumulator,
}

impl<M: Mapper> ParseTask<M> {
    /// Creates a new parse stage.
    #[must_use]
    pub fn new(
        mapper: M,
        input: SharedList<Value>,
        output: SharedList<M::Output>,
        errors: ErrorAccumulator,
    ) -> Self {
        Self {
            name: "parse".to_string(),
            mapper,
            input,
            output,
            errors,
        }
    }

    /// Sets the task name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<M: Mapper> std::fmt::Debug for ParseTask<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseTask")
            .field("name", &self.name)
            .field("records", &self.input.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<M: Mapper> Task for ParseTask<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Map
    }

    async fn execute(&self, _ctx: &TaskContext) -> TaskOutcome {
        let mapped: Result<Vec<M::Output>> = self
            .input
            .snapshot()
            .iter()
            .map(|record| self.mapper.map(record))
            .collect();
        match mapped {
            Ok(values) => {
                self.output.extend(values);
                TaskOutcome::Succeeded
            }
            Err(err) => record_failure(&self.errors, &self.name, err),
        }
    }
}
