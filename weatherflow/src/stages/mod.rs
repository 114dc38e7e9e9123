//! Pipeline stages.
//!
//! Each stage is a [`Task`](crate::scheduler::Task) constructed with the
//! buffers it reads and writes, plus the invocation's error accumulator. A
//! stage never lets a failure escape: it records exactly one error and
//! reports `TaskOutcome::Failed`, which the scheduler turns into a
//! cancellation of the stage and all of its successors.

mod completion;
mod deserialize;
mod fetch;
mod geolocation;
mod managed_parse;
mod parse;
mod request;

pub use completion::{CallbackCell, Completion, CompletionTask};
pub use deserialize::DeserializeTask;
pub use fetch::{FetchTask, HttpClient, HttpResponse, ReqwestHttpClient};
pub use geolocation::{
    GeolocationTask, LocationError, LocationProvider, UnavailableLocationProvider,
};
pub use managed_parse::ManagedParseTask;
pub use parse::ParseTask;
pub use request::{RegionQuery, RequestDescriptor, RequestTask, FORECAST_PATH};

use crate::buffers::ErrorAccumulator;
use crate::core::TaskOutcome;
use crate::errors::WeatherflowError;
use tracing::warn;

/// Records `err` and returns the matching failed outcome.
fn record_failure(errors: &ErrorAccumulator, task: &str, err: WeatherflowError) -> TaskOutcome {
    warn!(task = %task, kind = err.kind(), error = %err, "Task recorded failure");
    errors.record(err.clone());
    TaskOutcome::Failed(err)
}
