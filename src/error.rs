//! Error types for arduino2j.

use thiserror::Error;

/// Main error type for all arduino2j operations.
///
/// Failures inside a single exchange (timeouts, bad checksums, out-of-range
/// offsets) are answered with an error frame and reported through
/// [`Exchange`](crate::Exchange); they never surface here.
#[derive(Debug, Error)]
pub enum A2jError {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading a configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (malformed frame, bad header, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Received frame failed checksum verification.
    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    /// Payload does not fit in a single frame.
    #[error("Payload of {0} bytes exceeds frame capacity")]
    PayloadTooLarge(usize),

    /// The busy flag is held by a reply or another server-initiated frame.
    #[error("Server-initiated frame rejected: engine busy")]
    SifBusy,

    /// Server-initiated frames are disabled by configuration.
    #[error("Server-initiated frames are disabled")]
    SifDisabled,

    /// Byte stream closed by the peer.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using A2jError.
pub type Result<T> = std::result::Result<T, A2jError>;
