//! Scratch and state buffers whose lifetime is tied to "at least one
//! viewer connected".
//!
//! The whole set is created lazily on the 0→1 viewer transition and
//! destroyed eagerly on the 1→0 transition, so an idle host holds no
//! streaming memory at all. The engine stores it as `Option<BufferSet>`
//! and treats allocation failure as "stay unallocated" — every tick is
//! then a no-op until the next connect retries.

use crate::error::CastError;
use crate::stream::frame::DisplayDims;

/// Absolute minimum process-buffer capacity, tolerating incompressible
/// payloads on very small displays.
pub const PROCESS_FLOOR: usize = 2048;

/// Capacity of the reusable encode scratch buffer.
///
/// 120% of the largest raw payload it must ever hold, with a floor of
/// [`PROCESS_FLOOR`] bytes.
pub fn process_capacity(largest_payload: usize) -> usize {
    largest_payload.saturating_mul(6).div_ceil(5).max(PROCESS_FLOOR)
}

fn alloc_zeroed(len: usize) -> Result<Vec<u8>, CastError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| CastError::Allocation(format!("{len} bytes: {e}")))?;
    buf.resize(len, 0);
    Ok(buf)
}

// ── BatchBuffer ──────────────────────────────────────────────────

/// Accumulates consecutive raw dirty frames end-to-end.
#[derive(Debug)]
pub struct BatchBuffer {
    data: Vec<u8>,
    frame_len: usize,
    frames: usize,
    capacity_frames: usize,
}

impl BatchBuffer {
    fn new(frame_len: usize, capacity_frames: usize) -> Result<Self, CastError> {
        Ok(Self {
            data: alloc_zeroed(frame_len * capacity_frames)?,
            frame_len,
            frames: 0,
            capacity_frames,
        })
    }

    /// Append one raw frame; returns `true` once the batch is full.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if called on a full batch or with a frame
    /// of the wrong length — the streamer flushes before that can
    /// happen.
    pub fn push(&mut self, frame: &[u8]) -> bool {
        debug_assert!(self.frames < self.capacity_frames);
        debug_assert_eq!(frame.len(), self.frame_len);

        let start = self.frames * self.frame_len;
        self.data[start..start + self.frame_len].copy_from_slice(frame);
        self.frames += 1;
        self.frames == self.capacity_frames
    }

    /// Frames accumulated so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Whether another [`push`](Self::push) would complete the batch.
    pub fn is_full(&self) -> bool {
        self.frames == self.capacity_frames
    }

    /// The accumulated frames, concatenated.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.frames * self.frame_len]
    }

    /// The last accumulated frame, if any.
    pub fn last_frame(&self) -> Option<&[u8]> {
        if self.frames == 0 {
            return None;
        }
        let start = (self.frames - 1) * self.frame_len;
        Some(&self.data[start..start + self.frame_len])
    }

    /// Discard all accumulated frames.
    pub fn reset(&mut self) {
        self.frames = 0;
    }
}

// ── BufferSet ────────────────────────────────────────────────────

/// All buffers the engine needs while at least one viewer is connected.
#[derive(Debug)]
pub struct BufferSet {
    /// Pixel data of the last successfully broadcast frame.
    pub previous: Vec<u8>,
    /// 180°-rotation scratch; present only when `flip180` is set.
    pub flip: Option<Vec<u8>>,
    /// Batch accumulator; present only when `batch_size > 1`.
    pub batch: Option<BatchBuffer>,
    /// Reusable encode output, sized by [`process_capacity`].
    pub process: Vec<u8>,
}

impl BufferSet {
    /// Allocate the full set for the given display and options.
    ///
    /// The previous buffer starts zeroed, which is fine: the first send
    /// after allocation is always a forced full frame, never a diff.
    pub fn allocate(
        dims: DisplayDims,
        flip180: bool,
        batch_size: usize,
    ) -> Result<Self, CastError> {
        let frame_len = dims.buffer_len();
        let largest_payload = frame_len * batch_size.max(1);

        Ok(Self {
            previous: alloc_zeroed(frame_len)?,
            flip: if flip180 {
                Some(alloc_zeroed(frame_len)?)
            } else {
                None
            },
            batch: if batch_size > 1 {
                Some(BatchBuffer::new(frame_len, batch_size)?)
            } else {
                None
            },
            process: alloc_zeroed(process_capacity(largest_payload))?,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> DisplayDims {
        DisplayDims::new(128, 64).unwrap()
    }

    #[test]
    fn process_capacity_scales_and_floors() {
        // Small payloads hit the 2 KB floor.
        assert_eq!(process_capacity(100), PROCESS_FLOOR);
        assert_eq!(process_capacity(1024), PROCESS_FLOOR);
        // Large payloads get 120%, rounded up.
        assert_eq!(process_capacity(4096), 4916);
        assert_eq!(process_capacity(10_000), 12_000);
    }

    #[test]
    fn allocate_minimal_set() {
        let set = BufferSet::allocate(dims(), false, 1).unwrap();
        assert_eq!(set.previous.len(), 1024);
        assert!(set.flip.is_none());
        assert!(set.batch.is_none());
        assert_eq!(set.process.len(), PROCESS_FLOOR);
    }

    #[test]
    fn allocate_with_flip_and_batch() {
        let set = BufferSet::allocate(dims(), true, 4).unwrap();
        assert_eq!(set.flip.as_ref().unwrap().len(), 1024);
        let batch = set.batch.as_ref().unwrap();
        assert_eq!(batch.frames(), 0);
        assert!(!batch.is_full());
        // 4 × 1024 raw → 120% = 4916.
        assert_eq!(set.process.len(), 4916);
    }

    #[test]
    fn batch_fills_and_resets() {
        let mut batch = BatchBuffer::new(4, 3).unwrap();
        assert!(!batch.push(&[1, 1, 1, 1]));
        assert!(!batch.push(&[2, 2, 2, 2]));
        assert!(batch.push(&[3, 3, 3, 3]));
        assert!(batch.is_full());

        assert_eq!(batch.filled(), &[1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);
        assert_eq!(batch.last_frame().unwrap(), &[3, 3, 3, 3]);

        batch.reset();
        assert_eq!(batch.frames(), 0);
        assert_eq!(batch.last_frame(), None);
    }
}
