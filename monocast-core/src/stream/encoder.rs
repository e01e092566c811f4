//! Frame encoder — turns dirty framebuffers into wire messages.
//!
//! Exactly one encoding mode is active, chosen at construction:
//!
//! - **Full**: the whole buffer, RLE-compressed when that is enabled
//!   and actually shrinks the payload.
//! - **Delta**: `(index, value)` triplets for each changed byte —
//!   never compressed, the triplet count is usually already small.
//! - **Batch**: raw dirty frames accumulate until the batch is full,
//!   then flush as one message with a CRC32 over the payload actually
//!   sent.
//!
//! Compression falls back to raw whenever the RLE output would
//! overflow the process buffer; the wire flag always reflects what was
//! sent, never the attempt. All frame memory lives in the
//! [`BufferSet`](crate::stream::buffers::BufferSet) — the encoder only
//! carries configuration, so it survives buffer deallocation cycles
//! untouched.

use crate::stream::buffers::BatchBuffer;
use crate::stream::crc::crc32;
use crate::stream::message::{ByteChange, WireMessage};
use crate::stream::rle;
use crate::stream::streamer::StreamOptions;

// ── EncodeMode ───────────────────────────────────────────────────

/// The active encoding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    /// Every send carries the whole framebuffer.
    Full,
    /// Sends carry changed bytes only.
    Delta,
    /// Dirty frames are bundled `batch_size` at a time.
    Batch,
}

impl EncodeMode {
    /// Derive the mode from stream options.
    ///
    /// `batch_size > 1` wins over delta; delta is explicitly ignored
    /// while batching.
    pub fn from_options(options: &StreamOptions) -> Self {
        if options.batch_size > 1 {
            EncodeMode::Batch
        } else if options.use_delta_frames {
            EncodeMode::Delta
        } else {
            EncodeMode::Full
        }
    }
}

// ── FrameEncoder ─────────────────────────────────────────────────

/// Stateless encoder bound to one mode and one option set.
#[derive(Debug)]
pub struct FrameEncoder {
    mode: EncodeMode,
    use_compression: bool,
    target_fps: u8,
}

impl FrameEncoder {
    /// Build an encoder for the given options.
    pub fn new(options: &StreamOptions) -> Self {
        Self {
            mode: EncodeMode::from_options(options),
            use_compression: options.use_compression,
            target_fps: options.target_fps(),
        }
    }

    /// The mode chosen at construction.
    pub fn mode(&self) -> EncodeMode {
        self.mode
    }

    /// Encode `source` as a full frame, using `process` as compression
    /// scratch.
    ///
    /// Used by Full mode and for every forced baseline frame regardless
    /// of mode. Compression is applied only when it is enabled, fits
    /// the process buffer, and beats the raw size.
    pub fn encode_full(&self, source: &[u8], process: &mut [u8]) -> WireMessage {
        if self.use_compression {
            if let Some(n) = rle::encode_into(source, process) {
                if n < source.len() {
                    return WireMessage::Full {
                        compressed: true,
                        payload: process[..n].to_vec(),
                    };
                }
            }
        }
        WireMessage::Full {
            compressed: false,
            payload: source.to_vec(),
        }
    }

    /// Encode the bytes of `source` that differ from `previous`.
    ///
    /// Callers only reach this when the buffers differ, so the triplet
    /// list is non-empty.
    pub fn encode_delta(&self, source: &[u8], previous: &[u8]) -> WireMessage {
        debug_assert_eq!(source.len(), previous.len());

        let triplets = source
            .iter()
            .zip(previous)
            .enumerate()
            .filter(|(_, (cur, prev))| cur != prev)
            .map(|(i, (cur, _))| ByteChange {
                index: i as u16,
                value: *cur,
            })
            .collect();

        WireMessage::Delta { triplets }
    }

    /// Flush the accumulated batch into one wire message and clear the
    /// accumulator.
    ///
    /// The payload is the RLE of the concatenated frames when
    /// compression is enabled and the encoding fits `process`, else the
    /// raw concatenation; the CRC always covers the payload actually
    /// placed on the wire. The caller updates the previous buffer after
    /// the broadcast goes out.
    pub fn flush_batch(&self, batch: &mut BatchBuffer, process: &mut [u8]) -> WireMessage {
        let raw = batch.filled();
        let frame_count = batch.frames() as u8;

        let (compressed, payload) = if self.use_compression {
            match rle::encode_into(raw, process) {
                Some(n) => (true, process[..n].to_vec()),
                None => (false, raw.to_vec()),
            }
        } else {
            (false, raw.to_vec())
        };

        let crc = crc32(&payload);
        batch.reset();

        WireMessage::Batch {
            frame_count,
            target_fps: self.target_fps,
            compressed,
            crc,
            payload,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::buffers::BufferSet;
    use crate::stream::frame::DisplayDims;

    fn dims() -> DisplayDims {
        DisplayDims::new(128, 64).unwrap()
    }

    fn options(compression: bool, delta: bool, batch: usize) -> StreamOptions {
        StreamOptions {
            use_compression: compression,
            use_delta_frames: delta,
            batch_size: batch,
            ..StreamOptions::default()
        }
    }

    #[test]
    fn mode_selection() {
        assert_eq!(
            EncodeMode::from_options(&options(true, false, 1)),
            EncodeMode::Full
        );
        assert_eq!(
            EncodeMode::from_options(&options(true, true, 1)),
            EncodeMode::Delta
        );
        // Batch wins even with delta requested.
        assert_eq!(
            EncodeMode::from_options(&options(true, true, 4)),
            EncodeMode::Batch
        );
    }

    #[test]
    fn full_frame_compresses_repetitive_data() {
        let enc = FrameEncoder::new(&options(true, false, 1));
        let mut bufs = BufferSet::allocate(dims(), false, 1).unwrap();

        let frame = vec![0u8; 1024];
        match enc.encode_full(&frame, &mut bufs.process) {
            WireMessage::Full { compressed, payload } => {
                assert!(compressed);
                // 1024 zero bytes → five RLE pairs.
                assert_eq!(payload, vec![255, 0, 255, 0, 255, 0, 255, 0, 4, 0]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn full_frame_falls_back_when_rle_grows() {
        let enc = FrameEncoder::new(&options(true, false, 1));
        let mut bufs = BufferSet::allocate(dims(), false, 1).unwrap();

        // Alternating bytes: RLE would double the size.
        let frame: Vec<u8> = (0..1024).map(|i| (i % 2) as u8).collect();
        match enc.encode_full(&frame, &mut bufs.process) {
            WireMessage::Full { compressed, payload } => {
                assert!(!compressed);
                assert_eq!(payload, frame);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn full_frame_raw_when_compression_disabled() {
        let enc = FrameEncoder::new(&options(false, false, 1));
        let mut bufs = BufferSet::allocate(dims(), false, 1).unwrap();

        let frame = vec![0u8; 1024];
        match enc.encode_full(&frame, &mut bufs.process) {
            WireMessage::Full { compressed, payload } => {
                assert!(!compressed);
                assert_eq!(payload.len(), 1024);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn delta_single_changed_byte() {
        let enc = FrameEncoder::new(&options(true, true, 1));

        let prev = vec![0u8; 1024];
        let mut curr = prev.clone();
        curr[10] = 0xFF;

        let msg = enc.encode_delta(&curr, &prev);
        // Emitted payload after the tag is exactly [0, 10, 0xFF].
        assert_eq!(&msg.to_bytes()[..], &[b'D', 0, 10, 0xFF]);
    }

    #[test]
    fn delta_applies_back_to_current() {
        let enc = FrameEncoder::new(&options(true, true, 1));

        let prev: Vec<u8> = (0..1024).map(|i| (i % 7) as u8).collect();
        let mut curr = prev.clone();
        curr[0] = 0xAA;
        curr[511] = 0xBB;
        curr[1023] = 0xCC;

        match enc.encode_delta(&curr, &prev) {
            WireMessage::Delta { triplets } => {
                assert_eq!(triplets.len(), 3);
                let mut rebuilt = prev.clone();
                for t in triplets {
                    rebuilt[t.index as usize] = t.value;
                }
                assert_eq!(rebuilt, curr);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn batch_flush_wire_layout() {
        let opts = StreamOptions {
            use_compression: true,
            use_delta_frames: false,
            batch_size: 4,
            frame_interval_ms: 33,
            ..StreamOptions::default()
        };
        let enc = FrameEncoder::new(&opts);
        let mut bufs = BufferSet::allocate(dims(), false, 4).unwrap();
        let batch = bufs.batch.as_mut().unwrap();

        for fill in 0..4u8 {
            let full = batch.push(&vec![fill; 1024]);
            assert_eq!(full, fill == 3);
        }

        let msg = enc.flush_batch(batch, &mut bufs.process);
        let bytes = msg.to_bytes();
        match msg {
            WireMessage::Batch {
                frame_count,
                target_fps,
                compressed,
                crc,
                payload,
            } => {
                assert_eq!(frame_count, 4);
                assert_eq!(target_fps, 30); // 1000 / 33
                assert!(compressed);
                assert_eq!(crc, crc32(&payload));
                // Four constant 1024-byte frames compress to 20 pairs.
                assert_eq!(payload.len(), 40);
                // Total: tag + 3 header bytes + 4-byte CRC + payload.
                assert_eq!(bytes.len(), 1 + 3 + 4 + 40);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        // Accumulator cleared by the flush.
        assert_eq!(bufs.batch.as_ref().unwrap().frames(), 0);
    }

    #[test]
    fn batch_raw_when_compression_disabled() {
        let opts = StreamOptions {
            use_compression: false,
            use_delta_frames: false,
            batch_size: 2,
            ..StreamOptions::default()
        };
        let enc = FrameEncoder::new(&opts);
        let mut bufs = BufferSet::allocate(dims(), false, 2).unwrap();
        let batch = bufs.batch.as_mut().unwrap();

        batch.push(&vec![1u8; 1024]);
        batch.push(&vec![2u8; 1024]);

        match enc.flush_batch(batch, &mut bufs.process) {
            WireMessage::Batch { compressed, payload, crc, .. } => {
                assert!(!compressed);
                assert_eq!(payload.len(), 2048);
                assert_eq!(crc, crc32(&payload));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
