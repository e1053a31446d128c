//! Error types for the session engine.

use std::time::Duration;

use thiserror::Error;

/// Failure to parse the outer gate envelope or a push payload.
///
/// A decode error never tears the session down: the receive loop logs it and
/// drops the frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] prost::DecodeError),

    #[error("frame carries no meta header")]
    MissingMeta,
}

/// Errors surfaced by [`Session`](crate::Session) calls.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server answered with a non-zero error code.
    #[error("{service}.{method} failed: code={code} {message}")]
    Protocol {
        service: String,
        method: String,
        code: i32,
        message: String,
    },

    /// No response arrived before the call's deadline.
    #[error("{call} timed out after {after:?}")]
    Timeout { call: String, after: Duration },

    /// The heartbeat watchdog gave up on a stalled connection and abandoned
    /// every pending call.
    #[error("{call} abandoned: connection stalled")]
    Stalled { call: String },

    /// The response body could not be decoded into the expected reply type.
    #[error("invalid reply body for {call}: {source}")]
    Body {
        call: String,
        #[source]
        source: prost::DecodeError,
    },

    /// Socket read or write failure. Fatal to the session.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("connection is not open")]
    NotConnected,

    #[error("connection closed")]
    Closed,

    #[error("session already started")]
    AlreadyStarted,

    /// Login succeeded on the wire but the reply named no account.
    #[error("login reply carried no account")]
    NoAccount,

    /// A sequence number was registered twice. Unreachable with the
    /// monotonic counter; reported rather than overwriting a waiter.
    #[error("sequence {0} is already pending")]
    DuplicateSequence(i64),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl SessionError {
    /// True for both deadline expiry and watchdog abandonment.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Stalled { .. })
    }

    /// True when the failure ends the session rather than a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Closed | Self::NotConnected)
    }

    /// Server error code, when the failure is a protocol error.
    pub fn protocol_code(&self) -> Option<i32> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_carries_call_context() {
        let err = SessionError::Protocol {
            service: "gamepb.plantpb.PlantService".into(),
            method: "Harvest".into(),
            code: 1000020,
            message: "land not mature".into(),
        };

        assert_eq!(
            err.to_string(),
            "gamepb.plantpb.PlantService.Harvest failed: code=1000020 land not mature"
        );
        assert_eq!(err.protocol_code(), Some(1000020));
        assert!(!err.is_timeout());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_stalled_counts_as_timeout() {
        let err = SessionError::Stalled {
            call: "gamepb.userpb.UserService.Heartbeat".into(),
        };
        assert!(err.is_timeout());
        assert!(SessionError::Transport("reset".into()).is_fatal());
    }
}
