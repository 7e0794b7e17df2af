//! Supervises the long-lived intake connection
//!
//! State machine: Idle -> Running -> {Running (after transient failure) |
//! Stopped (interrupt or exhausted attempts)}. The supervisor owns its
//! transport exclusively.

use super::retry::{Decision, RetryPolicy, RetryState};
use crate::error::{ErrorClass, OperatorError, OperatorResult};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// A long-poll or streaming connection the loop keeps alive.
///
/// `start` blocks until disconnect or error; a clean return counts as a
/// successful connection cycle.
#[async_trait]
pub trait IntakeTransport: Send {
    async fn start(&mut self) -> OperatorResult<()>;
}

/// Why the loop returned control to the process owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Operator-requested stop; not a failure
    Interrupted,
    /// Transient failures exceeded the policy's budget
    RetriesExhausted { attempts: u32 },
}

pub struct ServiceLoop<T: IntakeTransport> {
    transport: T,
    policy: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl<T: IntakeTransport> ServiceLoop<T> {
    pub fn new(transport: T, policy: RetryPolicy, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            transport,
            policy,
            shutdown,
        }
    }

    /// Run until interrupted or the retry budget is exhausted.
    ///
    /// The attempt count resets on any clean return of the blocking call,
    /// with no minimum stable-uptime requirement, and increments on every
    /// error exit.
    pub async fn run(mut self) -> StopReason {
        let mut state = RetryState::default();

        loop {
            if *self.shutdown.borrow() {
                info!("Intake stopped by operator");
                return StopReason::Interrupted;
            }

            let result = tokio::select! {
                res = self.transport.start() => res,
                _ = self.shutdown.changed() => Err(OperatorError::Interrupted),
            };

            match result {
                Ok(()) => {
                    if state.attempt > 0 {
                        info!("Intake recovered after {} failed cycles", state.attempt);
                    }
                    state.reset();
                }
                Err(e) => {
                    let class = e.class();
                    if class == ErrorClass::Interrupt {
                        info!("Intake stopped by operator");
                        return StopReason::Interrupted;
                    }

                    state.record(class);
                    crate::metrics::record_intake_reconnect(class);

                    match self.policy.next(class, state.attempt) {
                        Decision::Delay(delay) => {
                            warn!(
                                "Intake failed ({}): {}; retry attempt {} in {:?}",
                                class.as_str(),
                                e,
                                state.attempt,
                                delay
                            );
                            // Shutdown must not wait out a long backoff
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = self.shutdown.changed() => {
                                    info!("Intake stopped by operator during backoff");
                                    return StopReason::Interrupted;
                                }
                            }
                        }
                        Decision::GiveUp => {
                            error!(
                                "Intake giving up after {} failed cycles (last error: {})",
                                state.attempt, e
                            );
                            crate::metrics::record_intake_give_up();
                            return StopReason::RetriesExhausted {
                                attempts: state.attempt,
                            };
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedTransport {
        script: VecDeque<OperatorResult<()>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<OperatorResult<()>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    #[async_trait]
    impl IntakeTransport for ScriptedTransport {
        async fn start(&mut self) -> OperatorResult<()> {
            // Once the script runs out, behave like an operator stop so
            // tests always terminate
            self.script
                .pop_front()
                .unwrap_or(Err(OperatorError::Interrupted))
        }
    }

    struct HangingTransport;

    #[async_trait]
    impl IntakeTransport for HangingTransport {
        async fn start(&mut self) -> OperatorResult<()> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn policy(base_ms: u64, max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(base_ms),
            Duration::from_secs(60),
            Duration::from_secs(30),
            max_attempts,
        )
    }

    fn network_err() -> OperatorResult<()> {
        Err(OperatorError::IntakeConnection("connection reset".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn network_failures_back_off_exponentially_then_reset() {
        // Three network failures, then a clean cycle, then operator stop.
        let transport = ScriptedTransport::new(vec![
            network_err(),
            network_err(),
            network_err(),
            Ok(()),
            Err(OperatorError::Interrupted),
        ]);
        let (_tx, rx) = watch::channel(false);
        let service = ServiceLoop::new(transport, policy(100, 10), rx);

        let started = tokio::time::Instant::now();
        let reason = service.run().await;
        let elapsed = started.elapsed();

        assert_eq!(reason, StopReason::Interrupted);
        // Delays observed: base, 2*base, 4*base
        assert!(
            elapsed >= Duration::from_millis(700) && elapsed < Duration::from_millis(750),
            "unexpected total backoff: {:?}",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clean_cycle_resets_the_attempt_counter() {
        // Failure, clean cycle, failure: both failures must be treated as
        // attempt 1 (100ms each). Without the reset the second delay would
        // be 200ms.
        let transport = ScriptedTransport::new(vec![
            network_err(),
            Ok(()),
            network_err(),
            Err(OperatorError::Interrupted),
        ]);
        let (_tx, rx) = watch::channel(false);
        let service = ServiceLoop::new(transport, policy(100, 10), rx);

        let started = tokio::time::Instant::now();
        let reason = service.run().await;
        let elapsed = started.elapsed();

        assert_eq!(reason, StopReason::Interrupted);
        assert!(
            elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(250),
            "attempt counter did not reset: {:?}",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_stops_with_zero_delay_and_no_retry() {
        let transport = ScriptedTransport::new(vec![Err(OperatorError::Interrupted)]);
        let (_tx, rx) = watch::channel(false);
        let service = ServiceLoop::new(transport, policy(100, 10), rx);

        let started = tokio::time::Instant::now();
        let reason = service.run().await;

        assert_eq!(reason, StopReason::Interrupted);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_stop_the_loop() {
        let transport =
            ScriptedTransport::new(vec![network_err(), network_err(), network_err()]);
        let (_tx, rx) = watch::channel(false);
        let service = ServiceLoop::new(transport, policy(100, 3), rx);

        let reason = service.run().await;

        assert_eq!(reason, StopReason::RetriesExhausted { attempts: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_blocked_transport() {
        let (tx, rx) = watch::channel(false);
        let service = ServiceLoop::new(HangingTransport, policy(100, 10), rx);

        let handle = tokio::spawn(service.run());
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), StopReason::Interrupted);
    }
}
