//! Ordered, append-only record of stage failures.

use super::SharedList;
use crate::errors::WeatherflowError;

/// Failures recorded during one pipeline invocation.
///
/// The first recorded failure is the one reported to the caller; later ones
/// are kept for diagnostics only.
#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator {
    errors: SharedList<WeatherflowError>,
}

impl ErrorAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a failure.
    pub fn record(&self, error: WeatherflowError) {
        self.errors.push(error);
    }

    /// The failure that will be reported to the caller.
    #[must_use]
    pub fn first(&self) -> Option<WeatherflowError> {
        self.errors.first()
    }

    /// Number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true when nothing has failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// All failures in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<WeatherflowError> {
        self.errors.snapshot()
    }
}
