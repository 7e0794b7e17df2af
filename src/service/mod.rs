//! Resilient service loop for the update intake
//!
//! The supervisor keeps one long-lived blocking connection alive across
//! transient failures. Reconnect pacing is decided by [`RetryPolicy`], a
//! pure function over (error class, attempt count).

pub mod retry;
pub mod supervisor;

pub use retry::{Decision, RetryPolicy, RetryState};
pub use supervisor::{IntakeTransport, ServiceLoop, StopReason};
