//! Reconnect pacing policy
//!
//! Network blips usually clear quickly and get aggressive exponential
//! backoff; protocol-level and unexpected errors back off linearly, since
//! hammering a struggling remote service rarely helps.

use crate::config::RetryConfig;
use crate::error::ErrorClass;

use std::time::Duration;

/// What the supervisor should do after a failed connection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Delay(Duration),
    GiveUp,
}

/// Explicit retry progress threaded through the service loop
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryState {
    /// Consecutive failed cycles since the last clean return
    pub attempt: u32,
    pub last_class: Option<ErrorClass>,
}

impl RetryState {
    pub fn record(&mut self, class: ErrorClass) {
        self.attempt += 1;
        self.last_class = Some(class);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Pure mapping from (error class, attempt count) to the next delay.
/// No I/O, no clock access.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base: Duration,
    network_cap: Duration,
    other_cap: Duration,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(
        base: Duration,
        network_cap: Duration,
        other_cap: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            base,
            network_cap,
            other_cap,
            max_attempts,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.base_delay(),
            config.network_cap(),
            config.other_cap(),
            config.max_attempts,
        )
    }

    /// Next delay for the given attempt (1-based), or `GiveUp`.
    ///
    /// An operator interrupt is never retried, regardless of attempt count.
    pub fn next(&self, class: ErrorClass, attempt: u32) -> Decision {
        if class == ErrorClass::Interrupt {
            return Decision::GiveUp;
        }

        if attempt >= self.max_attempts {
            return Decision::GiveUp;
        }

        let delay = match class {
            // base * 2^(attempt-1), capped
            ErrorClass::Network => {
                let exp = attempt.saturating_sub(1).min(31);
                self.base
                    .saturating_mul(2u32.saturating_pow(exp))
                    .min(self.network_cap)
            }
            // base * attempt, capped
            _ => self.base.saturating_mul(attempt.max(1)).min(self.other_cap),
        };

        Decision::Delay(delay)
    }
}
