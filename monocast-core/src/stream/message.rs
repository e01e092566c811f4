//! Tagged wire messages broadcast to viewers.
//!
//! ## Wire format
//!
//! Each message is one leading tag byte followed by its payload:
//!
//! ```text
//! 'U'   [raw framebuffer bytes]
//! 'C'   [RLE pairs: (count, value)*]
//! 'D'   [(idx_hi, idx_lo, value)]*            one triplet per changed byte
//! 'B'   frame_count:  u8
//!       target_fps:   u8
//!       compressed:   u8   (0 | 1)
//!       crc32:        u32  (LE, over the payload that follows)
//!       payload:      [u8] (RLE pairs or raw concatenated frames)
//! ```
//!
//! Internally the tag is a [`WireMessage`] variant; the byte exists
//! only at this encode/parse boundary.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CastError;

// ── Tags ─────────────────────────────────────────────────────────

/// Full frame, raw bytes.
pub const TAG_FULL_RAW: u8 = b'U';
/// Full frame, RLE-compressed.
pub const TAG_FULL_RLE: u8 = b'C';
/// Delta frame: changed-byte triplets.
pub const TAG_DELTA: u8 = b'D';
/// Batch of consecutive frames.
pub const TAG_BATCH: u8 = b'B';

/// Fixed header bytes of a batch message after the tag.
const BATCH_HEADER_LEN: usize = 7;

// ── ByteChange ───────────────────────────────────────────────────

/// One changed byte inside a delta message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteChange {
    /// Byte offset into the packed framebuffer.
    pub index: u16,
    /// New value at that offset.
    pub value: u8,
}

// ── WireMessage ──────────────────────────────────────────────────

/// A frame update ready for broadcast, one variant per message kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// The whole framebuffer.
    Full {
        /// Whether `payload` is RLE pairs (`true`) or raw bytes.
        compressed: bool,
        payload: Vec<u8>,
    },
    /// Only the bytes that changed since the previous broadcast.
    Delta { triplets: Vec<ByteChange> },
    /// Several consecutive raw frames bundled into one transmission.
    Batch {
        /// Number of frames concatenated in the (uncompressed) payload.
        frame_count: u8,
        /// Playback rate hint, `1000 / frame_interval_ms`.
        target_fps: u8,
        /// Whether `payload` is RLE pairs.
        compressed: bool,
        /// CRC32 over `payload` exactly as it appears on the wire.
        crc: u32,
        payload: Vec<u8>,
    },
}

impl WireMessage {
    /// Tag byte this message carries on the wire.
    pub fn tag(&self) -> u8 {
        match self {
            WireMessage::Full { compressed: false, .. } => TAG_FULL_RAW,
            WireMessage::Full { compressed: true, .. } => TAG_FULL_RLE,
            WireMessage::Delta { .. } => TAG_DELTA,
            WireMessage::Batch { .. } => TAG_BATCH,
        }
    }

    /// Total encoded size, tag byte included.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            WireMessage::Full { payload, .. } => payload.len(),
            WireMessage::Delta { triplets } => triplets.len() * 3,
            WireMessage::Batch { payload, .. } => BATCH_HEADER_LEN + payload.len(),
        }
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(self.tag());

        match self {
            WireMessage::Full { payload, .. } => {
                buf.put_slice(payload);
            }
            WireMessage::Delta { triplets } => {
                for t in triplets {
                    buf.put_u8((t.index >> 8) as u8);
                    buf.put_u8((t.index & 0xFF) as u8);
                    buf.put_u8(t.value);
                }
            }
            WireMessage::Batch {
                frame_count,
                target_fps,
                compressed,
                crc,
                payload,
            } => {
                buf.put_u8(*frame_count);
                buf.put_u8(*target_fps);
                buf.put_u8(u8::from(*compressed));
                buf.put_u32_le(*crc);
                buf.put_slice(payload);
            }
        }

        buf.freeze()
    }

    /// Parse wire bytes back into a message.
    ///
    /// Structural validation only; batch CRC verification is the
    /// decoder's job so corrupted payloads surface as
    /// [`CastError::ChecksumMismatch`] rather than a parse failure.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CastError> {
        let (&tag, body) = data
            .split_first()
            .ok_or(CastError::Truncated("empty message"))?;

        match tag {
            TAG_FULL_RAW => Ok(WireMessage::Full {
                compressed: false,
                payload: body.to_vec(),
            }),
            TAG_FULL_RLE => Ok(WireMessage::Full {
                compressed: true,
                payload: body.to_vec(),
            }),
            TAG_DELTA => {
                if body.len() % 3 != 0 {
                    return Err(CastError::Truncated("delta triplet stream"));
                }
                let triplets = body
                    .chunks_exact(3)
                    .map(|t| ByteChange {
                        index: u16::from_be_bytes([t[0], t[1]]),
                        value: t[2],
                    })
                    .collect();
                Ok(WireMessage::Delta { triplets })
            }
            TAG_BATCH => {
                if body.len() < BATCH_HEADER_LEN {
                    return Err(CastError::Truncated("batch header"));
                }
                let crc = u32::from_le_bytes([body[3], body[4], body[5], body[6]]);
                Ok(WireMessage::Batch {
                    frame_count: body[0],
                    target_fps: body[1],
                    compressed: body[2] != 0,
                    crc,
                    payload: body[BATCH_HEADER_LEN..].to_vec(),
                })
            }
            other => Err(CastError::UnknownTag(other)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
