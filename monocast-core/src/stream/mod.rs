//! # Frame streaming engine
//!
//! Mirrors a packed 1-bpp display to every connected viewer:
//!
//! ```text
//! HOST (device)                                 VIEWERS
//! ┌──────────────────────────┐                 ┌───────────────────┐
//! │ live framebuffer (1-bpp) │                 │ FrameDecoder      │
//! │   ↓ FrameView            │                 │   ↓               │
//! │ FrameStreamer::tick      │    TCP          │ reconstructed fb  │
//! │   ├ detect (dirty?)      │ ───────────►    │   ↓ render        │
//! │   ├ FrameEncoder         │  broadcast      └───────────────────┘
//! │   │   (rle, crc)         │  to all
//! │   └ BufferSet            │
//! └──────────────────────────┘
//! ```
//!
//! | Module     | Purpose                                           |
//! |------------|---------------------------------------------------|
//! | `frame`    | Display dimensions, frame views, 180° flip        |
//! | `detect`   | Byte-wise change detection                        |
//! | `rle`      | Run-length codec for full/batch payloads          |
//! | `crc`      | CRC32 integrity checksum for batch payloads       |
//! | `message`  | Tagged wire messages (`U`/`C`/`D`/`B`)            |
//! | `buffers`  | Connection-scoped buffer set and sizing           |
//! | `encoder`  | Full / delta / batch encoding                     |
//! | `decoder`  | Viewer-side reconstruction and verification       |
//! | `streamer` | The per-tick engine and state machine             |

pub mod buffers;
pub mod crc;
pub mod decoder;
pub mod detect;
pub mod encoder;
pub mod frame;
pub mod message;
pub mod rle;
pub mod streamer;

// ── Re-exports ───────────────────────────────────────────────────

pub use buffers::{BatchBuffer, BufferSet};
pub use decoder::FrameDecoder;
pub use detect::is_dirty;
pub use encoder::{EncodeMode, FrameEncoder};
pub use frame::{flip180_into, DisplayDims, FrameView};
pub use message::{ByteChange, WireMessage};
pub use streamer::{
    FrameKind, FrameSink, FrameStreamer, IdleReason, StreamOptions, StreamStats, TickOutcome,
};
