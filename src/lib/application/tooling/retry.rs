use crate::constants::HEARTBEAT_INTERVAL_SECS;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Constant,
    /// `delay * 2^(attempt-1)`
    Exponential,
}

/// Per-transport connect and invocation retry parameters.
///
/// Attempt numbers are 1-based; a delay is only ever taken between two
/// attempts, never after the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub connect_attempts: u32,
    pub connect_delay: Duration,
    pub invoke_attempts: u32,
    pub invoke_delay: Duration,
    pub backoff: Backoff,
    /// Tear down and reconnect between retries after a connection fault
    pub reconnect_on_fault: bool,
    /// Treat a `null` invocation result as a failure
    pub reject_empty_result: bool,
    pub heartbeat: Option<Duration>,
    pub request_timeout: Duration,
}

impl RetryPolicy {
    /// Spawned processes: single connect attempt, two constant-delay invocations.
    pub fn local_process() -> Self {
        Self {
            connect_attempts: 1,
            connect_delay: Duration::ZERO,
            invoke_attempts: 2,
            invoke_delay: Duration::from_secs(1),
            backoff: Backoff::Constant,
            reconnect_on_fault: false,
            reject_empty_result: false,
            heartbeat: None,
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Remote SSE services: three connects, three exponential invocations.
    pub fn streamed_remote() -> Self {
        Self {
            connect_attempts: 3,
            connect_delay: Duration::from_secs(2),
            invoke_attempts: 3,
            invoke_delay: Duration::from_secs(2),
            backoff: Backoff::Exponential,
            reconnect_on_fault: true,
            reject_empty_result: true,
            heartbeat: Some(Duration::from_secs(HEARTBEAT_INTERVAL_SECS)),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_invoke_attempts(mut self, attempts: u32) -> Self {
        self.invoke_attempts = attempts.max(1);
        self
    }

    pub fn with_heartbeat(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat = interval;
        self
    }

    /// Delay after the failed connect `attempt`: `connect_delay * attempt`.
    pub fn connect_backoff(&self, attempt: u32) -> Duration {
        self.connect_delay * attempt
    }

    /// Delay after the failed invocation `attempt`.
    pub fn invoke_backoff(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Constant => self.invoke_delay,
            Backoff::Exponential => {
                let exponent = attempt.saturating_sub(1).min(16);
                self.invoke_delay * 2u32.pow(exponent)
            }
        }
    }
}
