//! Structured logging helpers.
//!
//! Provides an operation timer used around generation and sweep passes
//! so the calling job can correlate duration with the per-pass counters.

use std::time::Instant;

/// Operation timer for measuring and logging execution duration.
#[derive(Debug)]
pub struct OpTimer {
    /// Component being timed (e.g. "generator", "lifecycle").
    component: &'static str,
    /// Operation being performed (e.g. "generate", "sweep").
    operation: &'static str,
    /// Start time of the operation.
    start: Instant,
}

impl OpTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(component: &'static str, operation: &'static str) -> Self {
        tracing::debug!(component, operation, "Operation started");
        Self {
            component,
            operation,
            start: Instant::now(),
        }
    }

    /// Finishes the timer and logs the duration.
    pub fn finish(self) {
        let duration_ms = self.start.elapsed().as_millis();
        tracing::debug!(
            component = self.component,
            operation = self.operation,
            duration_ms,
            "Operation completed"
        );
    }

    /// Finishes the timer, logging the duration and the error.
    pub fn finish_with_error(self, error: &dyn std::fmt::Display) {
        let duration_ms = self.start.elapsed().as_millis();
        tracing::warn!(
            component = self.component,
            operation = self.operation,
            duration_ms,
            error = %error,
            "Operation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_finishes_without_panicking() {
        let timer = OpTimer::new("generator", "generate");
        timer.finish();

        let timer = OpTimer::new("lifecycle", "sweep");
        timer.finish_with_error(&"store unavailable");
    }
}
