//! Domain-specific error types for the monocast engine.
//!
//! All fallible operations return `Result<T, CastError>`.
//! No panics on invalid input — every error is typed and recoverable.

use thiserror::Error;

/// The canonical error type for the monocast engine.
#[derive(Debug, Error)]
pub enum CastError {
    // ── Wire Errors ──────────────────────────────────────────────
    /// Received a message whose leading tag byte is not `U`/`C`/`D`/`B`.
    #[error("unknown message tag: {0:#04x}")]
    UnknownTag(u8),

    /// A message is shorter than its declared layout requires.
    #[error("truncated message: {0}")]
    Truncated(&'static str),

    /// An envelope exceeds the configured maximum size.
    #[error("envelope too large: {size} bytes (max {max})")]
    EnvelopeTooLarge { size: usize, max: usize },

    /// An envelope carried an unknown kind byte.
    #[error("unknown envelope kind: {0:#04x}")]
    UnknownEnvelopeKind(u8),

    /// The batch payload failed CRC32 verification.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    // ── Frame Errors ─────────────────────────────────────────────
    /// Display dimensions that cannot back a packed 1-bpp stream.
    #[error("invalid display dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: &'static str,
    },

    /// A supplied framebuffer does not match the display size.
    #[error("framebuffer length mismatch: expected {expected}, got {actual}")]
    FrameLengthMismatch { expected: usize, actual: usize },

    /// A decoded payload does not fit the reconstruction buffer.
    #[error("payload length mismatch: expected {expected}, got {actual}")]
    PayloadLengthMismatch { expected: usize, actual: usize },

    /// A delta triplet addressed a byte beyond the framebuffer.
    #[error("delta index out of range: {index} (buffer is {len} bytes)")]
    DeltaIndexOutOfRange { index: usize, len: usize },

    /// RLE-compressed bytes that cannot be decoded.
    #[error("malformed RLE stream: {0}")]
    MalformedRle(&'static str),

    // ── Resource Errors ──────────────────────────────────────────
    /// The buffer set could not be allocated.
    #[error("buffer allocation failed: {0}")]
    Allocation(String),

    // ── Control Errors ───────────────────────────────────────────
    /// A `BTN_EVENT` control message could not be parsed.
    #[error("invalid control message: {0}")]
    InvalidControl(String),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// UTF-8 conversion failed.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for CastError {
    fn from(s: String) -> Self {
        CastError::Other(s)
    }
}

impl From<&str> for CastError {
    fn from(s: &str) -> Self {
        CastError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for CastError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        CastError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = CastError::UnknownTag(b'X');
        assert!(e.to_string().contains("0x58"));

        let e = CastError::EnvelopeTooLarge {
            size: 2000,
            max: 1000,
        };
        assert!(e.to_string().contains("2000"));
        assert!(e.to_string().contains("1000"));
    }

    #[test]
    fn from_string() {
        let e: CastError = "something broke".into();
        assert!(matches!(e, CastError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: CastError = io_err.into();
        assert!(matches!(e, CastError::Connection(_)));
    }
}
