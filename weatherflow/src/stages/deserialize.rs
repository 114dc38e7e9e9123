//! Decodes fetched bytes into loosely typed records.

use super::record_failure;
use crate::buffers::{ByteBuffer, ErrorAccumulator, SharedList};
use crate::core::{TaskKind, TaskOutcome};
use crate::errors::WeatherflowError;
use crate::scheduler::{Task, TaskContext};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Parses the byte buffer as JSON.
///
/// A top-level array contributes each element; anything else contributes one
/// record. Nothing is written unless the whole document parses.
#[derive(Debug)]
pub struct DeserializeTask {
    name: String,
    input: ByteBuffer,
    output: SharedList<Value>,
    errors: ErrorAccumulator,
}

impl DeserializeTask {
    /// Creates a new deserialize stage.
    #[must_use]
    pub fn new(input: ByteBuffer, output: SharedList<Value>, errors: ErrorAccumulator) -> Self {
        Self {
            name: "deserialize".to_string(),
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

#[async_trait]
impl Task for DeserializeTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Deserialize
    }

    async fn execute(&self, _ctx: &TaskContext) -> TaskOutcome {
        let bytes = self.input.snapshot();
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Array(records)) => {
                debug!(task = %self.name, records = records.len(), "Decoded record list");
                self.output.extend(records);
                TaskOutcome::Succeeded
            }
            Ok(record) => {
                self.output.push(record);
                TaskOutcome::Succeeded
            }
            Err(e) => {
                record_failure(&self.errors, &self.name, WeatherflowError::malformed(e.to_string()))
            }
        }
    }
}
