//! Error types for the wire protocol layer.

/// Errors raised while framing, encoding, or decoding messages on the wire.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying transport failed (send/recv).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame was not terminated by the end-of-flow (NUL) byte before the
    /// buffer was exhausted.
    #[error("truncated frame: no end-of-flow byte found")]
    Truncated,

    /// The payload was well-framed but malformed per the protocol grammar.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Convenience alias for results in the wire layer.
pub type Result<T> = std::result::Result<T, Error>;
