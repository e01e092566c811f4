//! Viewer-side frame reconstruction.
//!
//! Takes [`WireMessage`]s received from the host and maintains a local
//! copy of the display. Batch payloads are CRC-verified before the
//! compression flag is trusted; every structural mismatch is a typed
//! error and leaves the previous framebuffer contents intact where
//! possible.

use crate::error::CastError;
use crate::stream::crc::crc32;
use crate::stream::frame::DisplayDims;
use crate::stream::message::WireMessage;
use crate::stream::rle;

// ── FrameDecoder ─────────────────────────────────────────────────

/// Stateful decoder that mirrors the host's display.
pub struct FrameDecoder {
    dims: DisplayDims,
    framebuffer: Vec<u8>,
}

impl FrameDecoder {
    /// Create a decoder for the given display; the local framebuffer
    /// starts black.
    pub fn new(dims: DisplayDims) -> Self {
        Self {
            dims,
            framebuffer: vec![0; dims.buffer_len()],
        }
    }

    /// Display dimensions this decoder reconstructs.
    pub fn dims(&self) -> DisplayDims {
        self.dims
    }

    /// The reconstructed framebuffer (packed 1-bpp).
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    /// Apply one message; returns the number of display frames it
    /// carried.
    ///
    /// A batch leaves the framebuffer at its **last** frame; callers
    /// that want to animate intermediate frames use
    /// [`apply_with`](Self::apply_with).
    pub fn apply(&mut self, message: &WireMessage) -> Result<usize, CastError> {
        self.apply_with(message, |_| {})
    }

    /// Apply one message, invoking `on_frame` with the framebuffer
    /// after each contained display frame.
    pub fn apply_with(
        &mut self,
        message: &WireMessage,
        mut on_frame: impl FnMut(&[u8]),
    ) -> Result<usize, CastError> {
        let frame_len = self.dims.buffer_len();

        match message {
            WireMessage::Full { compressed, payload } => {
                let raw = self.expand(payload, *compressed)?;
                if raw.len() != frame_len {
                    return Err(CastError::PayloadLengthMismatch {
                        expected: frame_len,
                        actual: raw.len(),
                    });
                }
                self.framebuffer.copy_from_slice(&raw);
                on_frame(&self.framebuffer);
                Ok(1)
            }
            WireMessage::Delta { triplets } => {
                // Validate every index before mutating anything.
                for t in triplets {
                    if t.index as usize >= frame_len {
                        return Err(CastError::DeltaIndexOutOfRange {
                            index: t.index as usize,
                            len: frame_len,
                        });
                    }
                }
                for t in triplets {
                    self.framebuffer[t.index as usize] = t.value;
                }
                on_frame(&self.framebuffer);
                Ok(1)
            }
            WireMessage::Batch {
                frame_count,
                compressed,
                crc,
                payload,
                ..
            } => {
                // Integrity first, before the compression flag is
                // trusted.
                let actual = crc32(payload);
                if actual != *crc {
                    return Err(CastError::ChecksumMismatch {
                        expected: *crc,
                        actual,
                    });
                }

                let raw = self.expand(payload, *compressed)?;
                let expected = *frame_count as usize * frame_len;
                if raw.len() != expected {
                    return Err(CastError::PayloadLengthMismatch {
                        expected,
                        actual: raw.len(),
                    });
                }

                for frame in raw.chunks_exact(frame_len) {
                    self.framebuffer.copy_from_slice(frame);
                    on_frame(&self.framebuffer);
                }
                Ok(*frame_count as usize)
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────

    fn expand(&self, payload: &[u8], compressed: bool) -> Result<Vec<u8>, CastError> {
        if compressed {
            rle::decode(payload)
        } else {
            Ok(payload.to_vec())
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
