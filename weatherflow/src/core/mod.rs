//! Core domain types shared by the scheduler and the pipeline stages.
//!
//! - Task kinds and lifecycle status
//! - Cancellation reasons
//! - Task body outcomes

mod outcome;
mod status;

pub use outcome::TaskOutcome;
pub use status::{CancelReason, TaskKind, TaskStatus};
