//! The single-threaded execution context for caller-facing work.
//!
//! Completion handoffs run here instead of on the Tokio worker pool, so a
//! caller can keep thread-affine state (a UI model, a non-`Send` handle) on
//! one well-known thread. Jobs run in submission order.

use super::{Task, TaskContext};
use crate::core::{CancelReason, TaskOutcome};
use crate::errors::{ConfigurationCode, ConfigurationError};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A dedicated named thread that runs submitted jobs one at a time.
///
/// Async task bodies are driven with `futures::executor::block_on`, so code
/// running here must not depend on Tokio timers or I/O.
pub struct ResultContext {
    name: String,
    thread_id: ThreadId,
    sender: Option<mpsc::Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl ResultContext {
    /// Starts the context thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn(name: impl Into<String>) -> std::io::Result<Arc<Self>> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            for job in receiver {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
                    warn!(panic = %panic_message(panic.as_ref()), "Result context job panicked");
                }
            }
        })?;
        debug!(context = %name, "Result context started");

        Ok(Arc::new(Self {
            name,
            thread_id: handle.thread().id(),
            sender: Some(sender),
            handle: Some(handle),
        }))
    }

    /// Name of the context thread.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the context thread.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Returns true when called from the context thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Queues a job without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the context thread has exited.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> Result<(), ConfigurationError> {
        let closed = || {
            ConfigurationError::new(
                ConfigurationCode::ResultContextClosed,
                format!("Result context '{}' is no longer running", self.name),
            )
        };
        let sender = self.sender.as_ref().ok_or_else(closed)?;
        sender.send(Box::new(job)).map_err(|_| closed())
    }

    /// Runs `job` on the context thread and waits for its value.
    ///
    /// # Errors
    ///
    /// Returns `CancelReason::Panicked` if the job panicked and
    /// `CancelReason::Failed` if the context is closed.
    pub async fn run<F, R>(&self, job: F) -> Result<R, CancelReason>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.dispatch(move || {
            let _ = tx.send(catch_unwind(AssertUnwindSafe(job)));
        })
        .map_err(|e| CancelReason::Failed(e.into()))?;

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(panic)) => Err(CancelReason::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(CancelReason::Failed(
                ConfigurationError::new(
                    ConfigurationCode::ResultContextClosed,
                    format!("Result context '{}' dropped a job", self.name),
                )
                .into(),
            )),
        }
    }

    /// Runs a task body on the context thread.
    pub(crate) async fn execute(
        &self,
        task: Arc<dyn Task>,
        ctx: TaskContext,
    ) -> Result<TaskOutcome, CancelReason> {
        self.run(move || futures::executor::block_on(async move { task.execute(&ctx).await }))
            .await
    }
}

impl std::fmt::Debug for ResultContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultContext")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

impl Drop for ResultContext {
    fn drop(&mut self) {
        // Closing the channel ends the receive loop.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if !self.is_current() && handle.join().is_err() {
                warn!(context = %self.name, "Result context thread panicked");
            }
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::FnTask;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_run_executes_on_context_thread() {
        let context = ResultContext::spawn("results").unwrap();
        let observer = Arc::clone(&context);

        let on_context = context.run(move || observer.is_current()).await.unwrap();
        assert!(on_context);
        assert!(!context.is_current());
    }

    #[tokio::test]
    async fn test_jobs_keep_submission_order() {
        let context = ResultContext::spawn("ordered").unwrap();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            context.dispatch(move || seen.lock().push(i)).unwrap();
        }
        context.run(|| ()).await.unwrap();
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported_and_thread_survives() {
        let context = ResultContext::spawn("panicky").unwrap();

        let result: Result<(), _> = context.run(|| panic!("boom")).await;
        assert_eq!(result, Err(CancelReason::Panicked("boom".to_string())));

        assert_eq!(context.run(|| 5).await, Ok(5));
    }

    #[tokio::test]
    async fn test_execute_task_body() {
        let context = ResultContext::spawn("tasks").unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let task: Arc<dyn Task> = Arc::new(FnTask::new("mark", move |_ctx| {
            flag.store(true, Ordering::SeqCst);
            TaskOutcome::Succeeded
        }));

        let outcome = context
            .execute(task, TaskContext::detached("mark"))
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert!(ran.load(Ordering::SeqCst));
    }
}
