//! Bounded recovery for collaborator failures.
//!
//! One budget is shared across failure classes so a session flapping between
//! a broken voice engine and a broken network still terminates after
//! `max_attempts` recoveries total. The class travels in the decision so the
//! caller can log which subsystem keeps failing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedOperation {
    Voice,
    Story,
}

impl FailedOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailedOperation::Voice => "voice",
            FailedOperation::Story => "story",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-invoke the failed operation.
    Retry(FailedOperation),
    /// Budget exhausted; the session is terminally failed.
    GiveUp,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn should_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub fn record_failure(&mut self, operation: FailedOperation) -> RetryDecision {
        self.attempts += 1;
        if self.should_retry() {
            RetryDecision::Retry(operation)
        } else {
            RetryDecision::GiveUp
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
