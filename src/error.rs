use std::time::Duration;
use thiserror::Error;

/// Errors raised while relaying one call
///
/// `Decode` and `Structure` are per-message failures: the bridges log them and
/// keep going. The remaining variants end the bridge that hit them.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed telephony frame or speech-service event
    #[error("failed to decode {source_name} message: {reason}")]
    Decode {
        source_name: &'static str,
        reason: String,
    },

    /// A completed-response payload was missing an expected field
    #[error("unexpected response structure: {0}")]
    Structure(String),

    /// The receiving side of an outbound sink has gone away
    #[error("{0} connection closed")]
    ConnectionClosed(&'static str),

    /// Transport error on the telephony websocket
    #[error("telephony connection error: {0}")]
    Telephony(String),

    /// Transport error on the speech-service websocket
    #[error("speech service connection error: {0}")]
    Speech(String),

    /// No telephony frame arrived within the configured idle window
    #[error("call idle for {0:?}")]
    IdleTimeout(Duration),
}

impl RelayError {
    pub fn decode(source_name: &'static str, reason: impl ToString) -> Self {
        Self::Decode {
            source_name,
            reason: reason.to_string(),
        }
    }

    /// Whether the bridge that produced this error should keep reading
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Structure(_))
    }
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
