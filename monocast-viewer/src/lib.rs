//! # monocast-viewer — Terminal Display Viewer
//!
//! Connects to `monocast-host`, reconstructs the mirrored 1-bpp
//! display with `monocast-core`'s decoder, renders it with half-block
//! glyphs, and forwards key presses as synthesized button events.

pub mod config;
pub mod display;
