//! Caller-side handle on a running pipeline.

use crate::scheduler::{GraphHandle, GraphReport};
use tokio::task::JoinHandle;

/// Handle returned by every `WeatherService` call site.
///
/// Dropping the handle detaches the pipeline; the completion callback still
/// fires.
#[derive(Debug)]
pub struct PipelineHandle {
    graph: GraphHandle,
    join: JoinHandle<Option<GraphReport>>,
}

impl PipelineHandle {
    pub(crate) fn new(graph: GraphHandle, join: JoinHandle<Option<GraphReport>>) -> Self {
        Self { graph, join }
    }

    /// Cancels every stage except the completion handoff.
    ///
    /// The callback still fires exactly once, with whatever the pipeline had
    /// settled before the cancellation took effect.
    pub fn cancel(&self) {
        self.graph.cancel_all("cancelled by caller");
    }

    /// Returns true once the pipeline has reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the pipeline to finish.
    ///
    /// Returns `None` if the graph could not be run at all.
    pub async fn join(self) -> Option<GraphReport> {
        self.join.await.ok().flatten()
    }
}
