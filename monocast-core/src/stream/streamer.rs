//! The per-tick streaming engine.
//!
//! A host loop calls [`FrameStreamer::tick`] once per iteration with a
//! read-only view of the live framebuffer. The engine owns everything
//! else: pacing, buffer lifecycle, change detection, encoding and the
//! previous-frame discipline. It never blocks and never spawns —
//! broadcasts are fire-and-forget into the [`FrameSink`].
//!
//! ## State machine
//!
//! ```text
//! NoClients ──connect──► Ready
//!     ▲                    │ each tick:
//!     │                    │   interval not elapsed? ── wait
//!     │                    │   buffers absent?       ── wait
//!     │                    │   any send queue busy?  ── wait
//!     │                    │   clean and not forced? ── wait
//!     │                    │   else encode → broadcast → update previous
//!     └──last disconnect───┘ (buffers freed)
//! ```
//!
//! Connection events arrive asynchronously from the transport; the
//! host funnels them into [`handle_connect`](FrameStreamer::handle_connect) /
//! [`handle_disconnect`](FrameStreamer::handle_disconnect) at the top
//! of the tick so buffer lifetime is only ever touched from the tick
//! context.

use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::CastError;
use crate::stream::buffers::BufferSet;
use crate::stream::detect::is_dirty;
use crate::stream::encoder::{EncodeMode, FrameEncoder};
use crate::stream::frame::{flip180_into, DisplayDims, FrameView};
use crate::stream::message::WireMessage;

// ── StreamOptions ────────────────────────────────────────────────

/// Streaming configuration, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Rotate frames 180° before encoding (display mounted upside down).
    pub flip180: bool,
    /// Enable RLE compression for full and batch payloads.
    pub use_compression: bool,
    /// Send changed-byte deltas instead of full frames when possible.
    /// Ignored while `batch_size > 1`.
    pub use_delta_frames: bool,
    /// Frames per batch message; 1 disables batching.
    pub batch_size: usize,
    /// Minimum interval between sends, in milliseconds.
    pub frame_interval_ms: u64,
    /// Delta mode: force a fresh full frame this often (ms); 0 disables.
    pub full_refresh_ms: u64,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            flip180: false,
            use_compression: true,
            use_delta_frames: true,
            batch_size: 1,
            frame_interval_ms: 33, // ~30 FPS
            full_refresh_ms: 10_000,
        }
    }
}

impl StreamOptions {
    /// Minimum interval between sends.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Periodic full-refresh interval, if enabled.
    pub fn full_refresh(&self) -> Option<Duration> {
        (self.full_refresh_ms > 0).then(|| Duration::from_millis(self.full_refresh_ms))
    }

    /// Playback rate hint carried in batch messages.
    pub fn target_fps(&self) -> u8 {
        (1000 / self.frame_interval_ms.max(1)).clamp(1, 255) as u8
    }

    /// Clamp out-of-range values instead of failing construction.
    ///
    /// The batch frame counter travels as a `u8`, so batches cap at
    /// 255 frames.
    pub fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.clamp(1, 255);
        self.frame_interval_ms = self.frame_interval_ms.max(1);
        self
    }
}

// ── FrameSink ────────────────────────────────────────────────────

/// Outbound side of the transport, as the engine sees it.
///
/// Implemented by [`ViewerHub`](crate::net::hub::ViewerHub); tests use
/// an in-memory recorder.
pub trait FrameSink {
    /// `true` when every connected viewer's outbound queue is empty.
    ///
    /// While any queue is non-empty a frame is still in flight and the
    /// engine must not start a new one.
    fn is_idle(&self) -> bool;

    /// Queue `payload` to every connected viewer. Must not block.
    fn broadcast(&self, payload: Bytes);
}

// ── Tick outcomes ────────────────────────────────────────────────

/// What kind of message a tick put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Full,
    Delta,
    Batch,
}

/// Why a tick did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    /// The frame interval has not elapsed yet.
    Pacing,
    /// No viewer is connected.
    NoViewers,
    /// Viewers exist but the buffer set is absent (allocation failed).
    BuffersAbsent,
    /// Some viewer's outbound queue is still draining.
    Backpressure,
    /// The framebuffer matches the last broadcast and no send is forced.
    Clean,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A message was broadcast.
    Sent { kind: FrameKind, bytes: usize },
    /// Batch mode: a dirty frame was appended, no flush yet.
    Accumulated { pending: usize },
    /// Nothing happened.
    Idle(IdleReason),
}

// ── StreamStats ──────────────────────────────────────────────────

/// Counters since engine construction (they survive buffer cycles).
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamStats {
    /// Wire messages broadcast.
    pub messages_sent: u64,
    /// Display frames delivered (a batch counts its frame total).
    pub frames_sent: u64,
    /// Wire bytes broadcast (tag and headers included).
    pub bytes_sent: u64,
    /// Full-frame messages.
    pub full_messages: u64,
    /// Delta messages.
    pub delta_messages: u64,
    /// Batch messages.
    pub batch_messages: u64,
    /// Messages whose payload went out RLE-compressed.
    pub compressed_messages: u64,
}

// ── FrameStreamer ────────────────────────────────────────────────

/// The frame-streaming engine.
pub struct FrameStreamer {
    dims: DisplayDims,
    options: StreamOptions,
    encoder: FrameEncoder,
    /// Present iff at least one viewer is connected and allocation
    /// succeeded.
    buffers: Option<BufferSet>,
    viewers: usize,
    /// Send a full baseline frame on the next tick, dirtiness aside.
    force_next_frame: bool,
    last_tick: Option<Instant>,
    last_full_frame: Option<Instant>,
    stats: StreamStats,
}

impl FrameStreamer {
    /// Create an engine for the given display.
    ///
    /// No buffers are allocated here — memory is only held while a
    /// viewer is connected.
    pub fn new(dims: DisplayDims, options: StreamOptions) -> Self {
        let options = options.normalized();
        let encoder = FrameEncoder::new(&options);
        info!(
            width = dims.width,
            height = dims.height,
            mode = ?encoder.mode(),
            "frame streamer created"
        );
        Self {
            dims,
            options,
            encoder,
            buffers: None,
            viewers: 0,
            force_next_frame: false,
            last_tick: None,
            last_full_frame: None,
            stats: StreamStats::default(),
        }
    }

    /// Display this engine streams.
    pub fn dims(&self) -> DisplayDims {
        self.dims
    }

    /// Active encoding mode.
    pub fn mode(&self) -> EncodeMode {
        self.encoder.mode()
    }

    /// Number of connected viewers the engine has been told about.
    pub fn viewer_count(&self) -> usize {
        self.viewers
    }

    /// Whether the buffer set currently exists.
    pub fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    /// Whether the next tick will send unconditionally.
    pub fn force_next_frame(&self) -> bool {
        self.force_next_frame
    }

    /// Counters since construction.
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// A viewer connected.
    ///
    /// On the 0→1 transition the buffer set is allocated; a failure is
    /// logged and the engine stays inert (every tick idles with
    /// [`IdleReason::BuffersAbsent`]) until the next 0→1 transition
    /// retries. Every connect forces a full baseline frame so the new
    /// viewer has something to diff against.
    pub fn handle_connect(&mut self) {
        self.viewers += 1;
        if self.viewers == 1 {
            match BufferSet::allocate(self.dims, self.options.flip180, self.options.batch_size) {
                Ok(set) => {
                    debug!("buffer set allocated");
                    self.buffers = Some(set);
                }
                Err(e) => {
                    error!("buffer allocation failed: {e}");
                    self.buffers = None;
                }
            }
        }
        self.force_next_frame = true;
    }

    /// A viewer disconnected.
    ///
    /// On the 1→0 transition every buffer is freed. Idempotent: extra
    /// disconnects (or disconnects before any connect) are no-ops.
    pub fn handle_disconnect(&mut self) {
        self.viewers = self.viewers.saturating_sub(1);
        if self.viewers == 0 && self.buffers.take().is_some() {
            debug!("last viewer left; buffer set freed");
            self.last_full_frame = None;
        }
    }

    // ── Tick ─────────────────────────────────────────────────────

    /// Run one tick against the current wall clock.
    pub fn tick(
        &mut self,
        frame: FrameView<'_>,
        sink: &impl FrameSink,
    ) -> Result<TickOutcome, CastError> {
        self.tick_at(Instant::now(), frame, sink)
    }

    /// Run one tick at an explicit instant (testable time).
    pub fn tick_at(
        &mut self,
        now: Instant,
        frame: FrameView<'_>,
        sink: &impl FrameSink,
    ) -> Result<TickOutcome, CastError> {
        if frame.dims() != self.dims {
            return Err(CastError::FrameLengthMismatch {
                expected: self.dims.buffer_len(),
                actual: frame.data().len(),
            });
        }

        // Pacing. The stamp advances as soon as the interval elapses,
        // even if the tick then idles.
        if let Some(last) = self.last_tick {
            if now.duration_since(last) < self.options.frame_interval() {
                return Ok(TickOutcome::Idle(IdleReason::Pacing));
            }
        }
        self.last_tick = Some(now);

        if self.viewers == 0 {
            return Ok(TickOutcome::Idle(IdleReason::NoViewers));
        }
        if self.buffers.is_none() {
            return Ok(TickOutcome::Idle(IdleReason::BuffersAbsent));
        }

        // Backpressure: while any viewer's queue is non-empty the tick
        // is a complete no-op — not even the dirty check runs.
        if !sink.is_idle() {
            return Ok(TickOutcome::Idle(IdleReason::Backpressure));
        }

        // Delta mode: periodically refresh with a full frame so viewers
        // recover from any missed delta.
        if self.encoder.mode() == EncodeMode::Delta && !self.force_next_frame {
            if let (Some(refresh), Some(last_full)) =
                (self.options.full_refresh(), self.last_full_frame)
            {
                if now.duration_since(last_full) > refresh {
                    self.force_next_frame = true;
                }
            }
        }

        let bufs = self
            .buffers
            .as_mut()
            .ok_or(CastError::Other("buffer set vanished mid-tick".into()))?;
        let BufferSet {
            previous,
            flip,
            batch,
            process,
        } = bufs;

        // Orientation first: everything downstream (dirty check, all
        // encoders, the previous buffer) sees the flipped image.
        let source: &[u8] = match flip {
            Some(flip_buf) => {
                flip180_into(frame.data(), flip_buf, self.dims);
                flip_buf.as_slice()
            }
            None => frame.data(),
        };

        if !is_dirty(source, previous) && !self.force_next_frame {
            return Ok(TickOutcome::Idle(IdleReason::Clean));
        }

        let forced = self.force_next_frame;
        let (message, kind) = if forced {
            // A forced baseline preempts the active mode. Any batch
            // accumulation predates the baseline and is discarded.
            if let Some(batch) = batch.as_mut() {
                batch.reset();
            }
            (self.encoder.encode_full(source, process), FrameKind::Full)
        } else {
            match self.encoder.mode() {
                EncodeMode::Full => {
                    (self.encoder.encode_full(source, process), FrameKind::Full)
                }
                EncodeMode::Delta => {
                    (self.encoder.encode_delta(source, previous), FrameKind::Delta)
                }
                EncodeMode::Batch => {
                    let batch = batch
                        .as_mut()
                        .ok_or(CastError::Other("batch mode without batch buffer".into()))?;
                    if !batch.push(source) {
                        return Ok(TickOutcome::Accumulated {
                            pending: batch.frames(),
                        });
                    }
                    (self.encoder.flush_batch(batch, process), FrameKind::Batch)
                }
            }
        };

        let wire = message.to_bytes();
        let wire_len = wire.len();
        sink.broadcast(wire);

        // The send has been issued: the previous buffer now mirrors
        // what every viewer will hold. (In batch mode the last flushed
        // frame is the one just accumulated, i.e. `source`.)
        previous.copy_from_slice(source);
        self.force_next_frame = false;
        if kind == FrameKind::Full {
            self.last_full_frame = Some(now);
        }
        self.record(kind, &message, wire_len);

        Ok(TickOutcome::Sent {
            kind,
            bytes: wire_len,
        })
    }

    // ── Internal ─────────────────────────────────────────────────

    fn record(&mut self, kind: FrameKind, message: &WireMessage, wire_len: usize) {
        self.stats.messages_sent += 1;
        self.stats.bytes_sent += wire_len as u64;

        let (frames, compressed) = match message {
            WireMessage::Full { compressed, .. } => (1, *compressed),
            WireMessage::Delta { .. } => (1, false),
            WireMessage::Batch {
                frame_count,
                compressed,
                ..
            } => (u64::from(*frame_count), *compressed),
        };
        self.stats.frames_sent += frames;
        if compressed {
            self.stats.compressed_messages += 1;
        }
        match kind {
            FrameKind::Full => self.stats.full_messages += 1,
            FrameKind::Delta => self.stats.delta_messages += 1,
            FrameKind::Batch => self.stats.batch_messages += 1,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
