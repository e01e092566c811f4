//! # monocast-core
//!
//! Core library for mirroring a device's monochrome display to remote
//! viewers over TCP.
//!
//! This crate contains:
//! - **Stream engine**: `FrameStreamer` — change detection, full/delta/
//!   batch encoding, RLE compression, CRC32 validation, connection-
//!   scoped buffer lifecycle, flow control
//! - **Wire types**: `WireMessage` with one variant per message tag,
//!   serialized only at the encoding boundary
//! - **Codec**: `ViewerCodec` for framed TCP I/O via `tokio_util`
//! - **Network**: `ViewerHub` — listener, per-client queues, broadcast
//! - **Control**: inbound `ping` / `BTN_EVENT` parsing and the button
//!   event bus types
//! - **Error**: `CastError` — typed, `thiserror`-based error hierarchy

pub mod codec;
pub mod control;
pub mod error;
pub mod net;
pub mod stream;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{Envelope, ViewerCodec, MAX_ENVELOPE_LEN};
pub use control::{ButtonAction, ButtonEvent, ControlMessage, InputSink};
pub use error::CastError;
pub use net::{ClientId, HubEvent, ViewerHub};
pub use stream::{
    DisplayDims, EncodeMode, FrameDecoder, FrameEncoder, FrameKind, FrameSink, FrameStreamer,
    FrameView, IdleReason, StreamOptions, StreamStats, TickOutcome, WireMessage,
};
