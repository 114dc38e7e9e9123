//! Hands the pipeline result to the caller.

use crate::buffers::{ErrorAccumulator, SharedList};
use crate::core::{TaskKind, TaskOutcome};
use crate::errors::{Result, WeatherflowError};
use crate::scheduler::{Task, TaskContext};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Caller callback: `(value, first_error)`.
pub type Completion<O> = Box<dyn FnOnce(Option<O>, Option<WeatherflowError>) + Send + 'static>;

/// Holds a completion callback and fires it at most once.
pub struct CallbackCell<O> {
    callback: Arc<Mutex<Option<Completion<O>>>>,
}

impl<O> Clone for CallbackCell<O> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<O> CallbackCell<O> {
    /// Wraps a callback.
    pub fn new(
        callback: impl FnOnce(Option<O>, Option<WeatherflowError>) + Send + 'static,
    ) -> Self {
        Self {
            callback: Arc::new(Mutex::new(Some(Box::new(callback)))),
        }
    }

    /// Invokes the callback if it has not fired yet. Returns whether it fired.
    pub fn fire(&self, value: Option<O>, error: Option<WeatherflowError>) -> bool {
        let callback = self.callback.lock().take();
        match callback {
            Some(callback) => {
                callback(value, error);
                true
            }
            None => false,
        }
    }

    /// Returns true once the callback has fired.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.callback.lock().is_none()
    }
}

impl<O> std::fmt::Debug for CallbackCell<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackCell")
            .field("fired", &self.has_fired())
            .finish()
    }
}

type Resolver<I, O> = Box<dyn Fn(I) -> Result<Option<O>> + Send + Sync>;

/// Reads the last result and the first error, resolves the result in the
/// caller's context and fires the callback.
///
/// Any recorded error wins: the callback then receives `(None, Some(err))`.
pub struct CompletionTask<I, O> {
    name: String,
    results: SharedList<I>,
    errors: ErrorAccumulator,
    resolve: Resolver<I, O>,
    callback: CallbackCell<O>,
}

impl<I, O> CompletionTask<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    /// Creates a completion stage.
    ///
    /// `resolve` turns the last result into the caller-facing value.
    pub fn new(
        results: SharedList<I>,
        errors: ErrorAccumulator,
        resolve: impl Fn(I) -> Result<Option<O>> + Send + Sync + 'static,
        callback: CallbackCell<O>,
    ) -> Self {
        Self {
            name: "complete".to_string(),
            results,
            errors,
            resolve: Box::new(resolve),
            callback,
        }
    }

    /// Sets the task name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn settle(&self) -> (Option<O>, Option<WeatherflowError>) {
        if let Some(err) = self.errors.first() {
            return (None, Some(err));
        }
        let Some(last) = self.results.last() else {
            return (None, None);
        };
        match (self.resolve)(last) {
            Ok(value) => (value, None),
            Err(err) => {
                self.errors.record(err.clone());
                (None, Some(err))
            }
        }
    }
}

impl<I, O> std::fmt::Debug for CompletionTask<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionTask")
            .field("name", &self.name)
            .field("callback", &self.callback)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<I, O> Task for CompletionTask<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Complete
    }

    async fn execute(&self, _ctx: &TaskContext) -> TaskOutcome {
        if self.callback.has_fired() {
            return TaskOutcome::Succeeded;
        }
        let (value, error) = self.settle();
        debug!(
            task = %self.name,
            has_value = value.is_some(),
            error = error.as_ref().map(WeatherflowError::kind),
            "Firing completion"
        );
        self.callback.fire(value, error);
        TaskOutcome::Succeeded
    }
}
