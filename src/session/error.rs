// ABOUTME: Error types for session operations and for the submit path
// ABOUTME: Session-fatal failures live in SmppError, expected submit outcomes in SubmitError

use crate::datatypes::CommandStatus;
use crate::multipart::SegmentError;
use std::io;
use thiserror::Error;

/// Error type for SMPP session operations
///
/// Covers connection management, binding and the acceptor. Expected submit
/// outcomes are reported separately through [`SubmitError`].
#[derive(Debug, Error)]
pub enum SmppError {
    /// I/O error during network operations (connection, read, write)
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// SMPP protocol error indicated by command_status field
    #[error("Protocol error: {} ({})", .0.short_code(), .0.description())]
    Protocol(CommandStatus),

    /// Configuration that cannot work, such as a session with no direction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation timeout
    #[error("Operation timeout")]
    Timeout,

    /// Unexpected PDU received where another was required
    #[error("Unexpected PDU: expected {expected}, got {actual}")]
    UnexpectedPdu { expected: String, actual: String },

    /// Connection closed unexpectedly
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// Session not in correct state for operation
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// A peer presented credentials no server session accepts
    #[error("Authentication failed for system_id '{0}'")]
    AuthenticationFailed(String),
}

/// Result type alias for SMPP operations
pub type SmppResult<T> = Result<T, SmppError>;

/// Why a message was not handed to the transport.
///
/// None of these affect the session; the caller decides whether to retry.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("session is not bound")]
    NotConnected,

    #[error("per-second submission limit reached")]
    RateLimited,

    #[error("sequence number {0} is already in flight")]
    DuplicateSequence(u32),

    #[error("message refused by the large message policy: {0}")]
    Rejected(#[from] SegmentError),
}

impl SubmitError {
    /// Numeric result code reported to gateway callers
    pub fn code(&self) -> u8 {
        match self {
            SubmitError::NotConnected => 1,
            SubmitError::RateLimited => 2,
            SubmitError::DuplicateSequence(_) => 3,
            SubmitError::Rejected(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_codes() {
        assert_eq!(SubmitError::NotConnected.code(), 1);
        assert_eq!(SubmitError::RateLimited.code(), 2);
        assert_eq!(SubmitError::DuplicateSequence(7).code(), 3);
        assert_eq!(
            SubmitError::from(SegmentError::InvalidSplitBase).code(),
            4
        );
    }

    #[test]
    fn protocol_error_names_status() {
        let err = SmppError::Protocol(CommandStatus::BindFailed);
        assert_eq!(err.to_string(), "Protocol error: ESME_RBINDFAIL (Bind Failed)");
    }
}
