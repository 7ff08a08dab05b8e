use std::time::Duration;

use tokio::time::Instant;

/// Per-request metadata handed down from the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: String,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into(), deadline: None }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// A timeout too large to represent leaves the request without a deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Time left before the deadline; `None` when the caller set no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Caps `budget` by whatever is left of the deadline.
    pub fn bound(&self, budget: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => budget.min(remaining),
            None => budget,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unassigned")
    }
}
