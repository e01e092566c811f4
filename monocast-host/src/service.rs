//! Host service core logic.
//!
//! Owns the viewer hub, the streaming engine and the demo scene, and
//! drives the cooperative tick loop:
//!
//! 1. Drain hub events (connect / disconnect / control text).
//! 2. Drain the input bus into the scene.
//! 3. Advance the scene one step.
//! 4. Hand the engine a view of the framebuffer and let it decide
//!    whether anything goes on the wire.
//!
//! All engine state is touched only from this loop; the hub's network
//! tasks communicate exclusively through channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use monocast_core::{
    control, ButtonEvent, ClientId, ControlMessage, DisplayDims, FrameStreamer, FrameView,
    HubEvent, InputSink, ViewerHub,
};

use crate::config::HostConfig;
use crate::scene::DemoScene;

/// How often the stats line goes to the log.
const STATS_INTERVAL: Duration = Duration::from_secs(30);

// ── HostService ──────────────────────────────────────────────────

/// The top-level host daemon.
pub struct HostService {
    config: HostConfig,
    running: Arc<AtomicBool>,
}

impl HostService {
    /// Create a new service with the given config.
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task (Ctrl-C handler).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the service until stopped.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        let dims = DisplayDims::new(self.config.display.width, self.config.display.height)?;
        let addr = self.config.network.listen_addr.parse()?;
        let mut hub = ViewerHub::bind(addr).await?;
        let mut streamer = FrameStreamer::new(dims, self.config.stream.clone());

        // The abstract input bus: control-channel button events end up
        // here, the scene consumes them as if a physical button fired.
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<ButtonEvent>();
        let mut scene = DemoScene::new(dims);

        // The loop runs faster than the frame interval; the engine's
        // own pacing decides which iterations actually send.
        let period = (self.config.stream.frame_interval() / 2).max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut last_stats = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;

            while let Some(event) = hub.poll_event() {
                match event {
                    HubEvent::Connected(id) => {
                        info!("viewer {id} joined ({} total)", hub.client_count());
                        streamer.handle_connect();
                    }
                    HubEvent::Disconnected(id) => {
                        info!("viewer {id} left ({} total)", hub.client_count());
                        streamer.handle_disconnect();
                    }
                    HubEvent::Text(id, text) => {
                        Self::route_control(&hub, &input_tx, id, &text);
                    }
                }
            }

            while let Ok(event) = input_rx.try_recv() {
                debug!("button event: pin={} action={}", event.pin, event.action);
                scene.handle_button(event);
            }

            scene.advance();
            let view = FrameView::new(dims, scene.framebuffer())?;
            streamer.tick(view, &hub)?;

            if last_stats.elapsed() > STATS_INTERVAL {
                let stats = streamer.stats();
                info!(
                    viewers = streamer.viewer_count(),
                    messages = stats.messages_sent,
                    frames = stats.frames_sent,
                    bytes = stats.bytes_sent,
                    compressed = stats.compressed_messages,
                    "stream stats"
                );
                last_stats = Instant::now();
            }
        }

        info!("host service stopped");
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Handle one inbound control text message.
    fn route_control(hub: &ViewerHub, input_tx: &InputSink, id: ClientId, text: &str) {
        match control::parse(text) {
            Ok(Some(ControlMessage::Ping)) => {
                hub.send_text(id, control::PONG);
            }
            Ok(Some(ControlMessage::Button(event))) => {
                if input_tx.send(event).is_err() {
                    warn!("input bus closed; dropping button event from {id}");
                }
            }
            Ok(None) => {
                debug!("viewer {id} sent unrecognized text; ignored");
            }
            Err(e) => {
                warn!("dropped malformed control message from {id}: {e}");
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
