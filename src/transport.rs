use thiserror::Error;

/// Failure of the underlying connection. The engine does not distinguish
/// causes; any transport failure bubbles up to the embedder, which owns
/// reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,

    #[error("send failed: {reason}")]
    SendFailed { reason: String },
}

/// A reliable, ordered text-frame send primitive. The embedder supplies the
/// implementation (websocket, TCP, in-memory for tests) and pumps received
/// frames into the engine itself.
pub trait Transport {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;
}
