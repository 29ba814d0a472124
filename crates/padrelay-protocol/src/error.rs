//! Error types for the protocol layer.
//!
//! Each crate in padrelay defines its own error enum. A `ProtocolError`
//! always means "these bytes do not form a valid message", never a
//! networking or room problem.

/// Errors that can occur while decoding datagrams or TCP requests.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The datagram ended before the fixed layout for its type did.
    #[error("truncated {kind} message: need {needed} bytes, got {got}")]
    Truncated {
        kind: &'static str,
        needed: usize,
        got: usize,
    },

    /// The leading type byte of a datagram is not a client message.
    #[error("unknown message type {0}")]
    UnknownKind(u8),

    /// A player number outside `0..MAX_PLAYERS`.
    #[error("player number {0} out of range")]
    InvalidPlayer(u8),

    /// A NUL-terminated filename kept growing past the limit.
    ///
    /// The stream cannot be resynchronized after this, so the connection
    /// is dropped.
    #[error("filename exceeds {0} bytes without terminator")]
    FilenameTooLong(usize),

    /// An upload announced a payload larger than the configured limit.
    #[error("blob of {size} bytes exceeds limit of {limit}")]
    BlobTooLarge { size: usize, limit: usize },

    /// Reading from the underlying stream failed.
    ///
    /// Required by `tokio_util::codec::Decoder`, which reports I/O errors
    /// through the codec's own error type.
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),
}
