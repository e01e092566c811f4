//! Packed 1-bpp framebuffer types shared across the pipeline.
//!
//! The display driver stores pixels in page layout: byte
//! `(y / 8) * width + x`, bit `y % 8`. Everything downstream (change
//! detection, encoding, flipping) operates on that packed byte form and
//! never unpacks to per-pixel representations.

use serde::{Deserialize, Serialize};

use crate::error::CastError;

// ── DisplayDims ──────────────────────────────────────────────────

/// Dimensions of the mirrored display.
///
/// Height must be a multiple of 8 (one page = 8 pixel rows) and the
/// packed buffer must stay addressable by the 16-bit byte indices used
/// in delta messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDims {
    /// Display width in pixels.
    pub width: u32,
    /// Display height in pixels.
    pub height: u32,
}

/// Largest packed buffer a delta message can address (16-bit index).
pub const MAX_FRAME_LEN: usize = 1 << 16;

impl DisplayDims {
    /// Validate and construct display dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, CastError> {
        let dims = Self { width, height };
        if width == 0 || height == 0 {
            return Err(CastError::InvalidDimensions {
                width,
                height,
                reason: "zero-sized display",
            });
        }
        if height % 8 != 0 {
            return Err(CastError::InvalidDimensions {
                width,
                height,
                reason: "height must be a multiple of 8",
            });
        }
        if dims.buffer_len() > MAX_FRAME_LEN {
            return Err(CastError::InvalidDimensions {
                width,
                height,
                reason: "packed buffer exceeds 16-bit delta addressing",
            });
        }
        Ok(dims)
    }

    /// Packed 1-bpp buffer size in bytes.
    pub const fn buffer_len(self) -> usize {
        (self.width as usize * self.height as usize) / 8
    }
}

// ── FrameView ────────────────────────────────────────────────────

/// A read-only borrow of the live framebuffer for one tick.
///
/// The engine never owns the live framebuffer; the display driver
/// does. The host hands out a view each tick and keeps ownership.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    dims: DisplayDims,
    data: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Wrap a packed framebuffer, checking its length against `dims`.
    pub fn new(dims: DisplayDims, data: &'a [u8]) -> Result<Self, CastError> {
        let expected = dims.buffer_len();
        if data.len() != expected {
            return Err(CastError::FrameLengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Display dimensions this view was validated against.
    pub fn dims(&self) -> DisplayDims {
        self.dims
    }

    /// The packed pixel bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

// ── 180° flip ────────────────────────────────────────────────────

/// Rotate a packed 1-bpp buffer by 180° into `dest`.
///
/// `dest` must be exactly `dims.buffer_len()` bytes; it is cleared
/// first, then every set source pixel `(x, y)` is written to
/// `(width-1-x, height-1-y)` in page layout.
pub fn flip180_into(src: &[u8], dest: &mut [u8], dims: DisplayDims) {
    let width = dims.width as usize;
    let height = dims.height as usize;
    debug_assert_eq!(src.len(), dims.buffer_len());
    debug_assert_eq!(dest.len(), dims.buffer_len());

    dest.fill(0);

    for y in 0..height {
        let src_mask = 1u8 << (y % 8);
        let src_row = (y / 8) * width;
        for x in 0..width {
            if src[src_row + x] & src_mask != 0 {
                let dx = width - 1 - x;
                let dy = height - 1 - y;
                dest[(dy / 8) * width + dx] |= 1 << (dy % 8);
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dims_validation() {
        assert!(DisplayDims::new(128, 64).is_ok());
        assert!(DisplayDims::new(0, 64).is_err());
        assert!(DisplayDims::new(128, 60).is_err());
        // 1024x1024 / 8 = 131072 bytes — beyond 16-bit delta indices.
        assert!(DisplayDims::new(1024, 1024).is_err());
    }

    #[test]
    fn buffer_len_for_typical_panel() {
        let dims = DisplayDims::new(128, 64).unwrap();
        assert_eq!(dims.buffer_len(), 1024);
    }

    #[test]
    fn frame_view_length_checked() {
        let dims = DisplayDims::new(128, 64).unwrap();
        let buf = vec![0u8; 1024];
        assert!(FrameView::new(dims, &buf).is_ok());

        let short = vec![0u8; 100];
        assert!(matches!(
            FrameView::new(dims, &short),
            Err(CastError::FrameLengthMismatch { expected: 1024, actual: 100 })
        ));
    }

    #[test]
    fn flip_moves_corner_pixel() {
        let dims = DisplayDims::new(16, 16).unwrap();
        let mut src = vec![0u8; dims.buffer_len()];
        // Set pixel (0, 0): byte 0, bit 0.
        src[0] = 0x01;

        let mut dest = vec![0u8; dims.buffer_len()];
        flip180_into(&src, &mut dest, dims);

        // Expect pixel (15, 15): byte (15/8)*16 + 15 = 31, bit 15 % 8 = 7.
        assert_eq!(dest[31], 0x80);
        assert_eq!(dest.iter().filter(|&&b| b != 0).count(), 1);
    }

    #[test]
    fn flip_twice_is_identity() {
        let dims = DisplayDims::new(32, 16).unwrap();
        let src: Vec<u8> = (0..dims.buffer_len()).map(|i| (i * 37) as u8).collect();

        let mut once = vec![0u8; dims.buffer_len()];
        let mut twice = vec![0u8; dims.buffer_len()];
        flip180_into(&src, &mut once, dims);
        flip180_into(&once, &mut twice, dims);

        assert_eq!(src, twice);
    }
}
