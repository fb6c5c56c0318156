use thiserror::Error;

use crate::transport::TransportError;

/// Frame- and body-level decoding failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: &'static str },

    #[error("unknown frame command: {command}")]
    UnknownCommand { command: String },

    #[error("frame is missing required header '{name}'")]
    MissingHeader { name: &'static str },

    #[error("message body error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the wire session as a whole.
#[derive(Debug, Error)]
pub enum WireError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A send was attempted before the server assigned a session id.
    #[error("session handshake has not completed")]
    HandshakePending,

    /// The server reported an error frame; the session is unusable.
    #[error("server error: {message}")]
    Server { message: String },
}
