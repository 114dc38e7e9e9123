//! # Weatherflow
//!
//! Fetches weather forecasts from a JSON API and persists them into an
//! object store, as a graph of small cancellable tasks.
//!
//! Each lookup runs one pipeline:
//!
//! - **request**: builds the forecast URL from the configuration
//! - **fetch**: performs the HTTP request into a byte buffer
//! - **deserialize**: decodes the bytes into records
//! - **persist**: upserts every record in a scoped store session and saves it
//! - **complete**: resolves the result on the result context and invokes the
//!   caller's callback exactly once
//!
//! Stages hand data to each other through shared buffers and report failures
//! through an error accumulator. A failed or cancelled stage cancels all of
//! its successors without running them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use weatherflow::prelude::*;
//!
//! let service = WeatherService::new(WeatherConfig::from_env())?;
//! let region = service.region_by_id(3_143_244).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod buffers;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod mapping;
pub mod observability;
pub mod scheduler;
pub mod service;
pub mod stages;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::buffers::{ByteBuffer, ErrorAccumulator, SharedList, Slot};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::WeatherConfig;
    pub use crate::core::{CancelReason, TaskKind, TaskOutcome, TaskStatus};
    pub use crate::errors::{ConfigurationError, WeatherflowError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::mapping::{EntityMapper, Mapper, RegionMapper};
    pub use crate::scheduler::{ResultContext, Task, TaskContext, TaskGraph, TaskId, TaskSpec};
    pub use crate::service::{PipelineHandle, WeatherService};
    pub use crate::stages::{HttpClient, LocationProvider, RegionQuery};
    pub use crate::store::{Coordinate, EntityRef, ObjectStore, Region};
}
