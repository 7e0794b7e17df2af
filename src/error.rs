//! Error types for the vault operator

use thiserror::Error;

/// Main error type for the operator service
#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain connection error: {0}")]
    ChainConnection(String),

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),

    #[error("Intake connection error: {0}")]
    IntakeConnection(String),

    #[error("Intake protocol error: {0}")]
    IntakeProtocol(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Operator interrupt")]
    Interrupted,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classification driving the reconnect policy.
///
/// Only the service loop consults this; transaction failures are terminal
/// values (`tx::TxFailure`) and never feed back into retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeouts and connection-level failures, expected to clear quickly
    Network,
    /// Remote service rejected us at the protocol level; still retried
    ProtocolFatalish,
    /// Catch-all; still retried
    Unexpected,
    /// Operator-requested stop, never retried
    Interrupt,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Network => "network",
            ErrorClass::ProtocolFatalish => "protocol",
            ErrorClass::Unexpected => "unexpected",
            ErrorClass::Interrupt => "interrupt",
        }
    }
}

impl OperatorError {
    /// Classify for the service loop's retry policy
    pub fn class(&self) -> ErrorClass {
        match self {
            OperatorError::ChainConnection(_)
            | OperatorError::IntakeConnection(_)
            | OperatorError::Timeout { .. } => ErrorClass::Network,
            OperatorError::IntakeProtocol(_) => ErrorClass::ProtocolFatalish,
            OperatorError::Interrupted => ErrorClass::Interrupt,
            _ => ErrorClass::Unexpected,
        }
    }
}

/// Result type for operator operations
pub type OperatorResult<T> = Result<T, OperatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_the_loop_taxonomy() {
        assert_eq!(
            OperatorError::IntakeConnection("reset".into()).class(),
            ErrorClass::Network
        );
        assert_eq!(
            OperatorError::Timeout {
                operation: "poll".into()
            }
            .class(),
            ErrorClass::Network
        );
        assert_eq!(
            OperatorError::IntakeProtocol("409 conflict".into()).class(),
            ErrorClass::ProtocolFatalish
        );
        assert_eq!(OperatorError::Interrupted.class(), ErrorClass::Interrupt);
        assert_eq!(
            OperatorError::Internal("boom".into()).class(),
            ErrorClass::Unexpected
        );
    }
}
