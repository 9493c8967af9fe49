//! Per-request execution context.

use uuid::Uuid;

/// Carries the correlation id that attributes side-effect artifacts (chart
/// files and the like) to the run that produced them, plus the attempt
/// number for diagnostics. The id is fixed when the request starts so
/// callers can derive artifact names before execution begins.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    correlation_id: Uuid,
    attempt: usize,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self { correlation_id: Uuid::new_v4(), attempt: 0 }
    }

    pub fn with_id(correlation_id: Uuid) -> Self {
        Self { correlation_id, attempt: 0 }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Same correlation id, new attempt counter.
    pub fn for_attempt(&self, attempt: usize) -> Self {
        Self { correlation_id: self.correlation_id, attempt }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
