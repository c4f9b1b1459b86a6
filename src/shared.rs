use thiserror::Error;

use crate::client::ClientError;

/// Errors surfaced by the bridge call surface.
///
/// Invariant violations (`AlreadyListening`, `NoListener`) and `NotConnected`
/// are detected locally before any network call, so a caller can tell an API
/// misuse apart from a protocol/network failure (`Protocol`).
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("session is not ready: {0}")]
    NotConnected(String),

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("already listening: {0}")]
    AlreadyListening(String),

    #[error("no listener registered: {0}")]
    NoListener(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ClientError),
}

impl BridgeError {
    /// Stable machine-readable label for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::NotConnected(_) => "E_NOT_CONNECTED",
            BridgeError::RoomNotFound(_) => "E_ROOM_NOT_FOUND",
            BridgeError::AlreadyListening(_) => "E_ALREADY_LISTENING",
            BridgeError::NoListener(_) => "E_NO_LISTENER",
            BridgeError::Protocol(_) => "E_PROTOCOL_ERROR",
        }
    }

    /// The underlying protocol client failure, when there is one.
    pub fn cause(&self) -> Option<&ClientError> {
        match self {
            BridgeError::Protocol(cause) => Some(cause),
            _ => None,
        }
    }
}
