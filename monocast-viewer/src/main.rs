//! monocast terminal viewer — entry point.
//!
//! ```text
//! monocast-viewer                       Connect to 127.0.0.1:7411
//! monocast-viewer --host <addr>        Connect to a specific host
//! monocast-viewer --config <path>      Use custom config TOML
//! monocast-viewer --gen-config         Dump default config and exit
//! ```
//!
//! Keys: arrows and Enter/Space synthesize device button events,
//! `p` sends a ping, `q` / Esc quits.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use monocast_core::{
    ButtonAction, ButtonEvent, DisplayDims, Envelope, FrameDecoder, ViewerCodec, WireMessage,
};

use monocast_viewer::config::ViewerConfig;
use monocast_viewer::display::TerminalDisplay;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "monocast-viewer", about = "monocast display mirror viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "monocast-viewer.toml")]
    config: PathBuf,

    /// Host address (overrides config). Example: 192.168.1.50:7411
    #[arg(long)]
    host: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.network.host_address = host;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let dims = DisplayDims::new(config.display.width, config.display.height)?;

    let stream = tokio::time::timeout(
        Duration::from_millis(config.network.timeout_ms),
        TcpStream::connect(&config.network.host_address),
    )
    .await
    .map_err(|_| format!("connect to {} timed out", config.network.host_address))??;

    let mut connection = Framed::new(stream, ViewerCodec);
    let mut decoder = FrameDecoder::new(dims);
    let mut display = TerminalDisplay::new(dims)?;
    let mut keys = EventStream::new();

    let mut frames: u64 = 0;
    let mut bytes: u64 = 0;

    display.render(
        decoder.framebuffer(),
        &format!("connected to {} — waiting for frames", config.network.host_address),
    )?;

    loop {
        tokio::select! {
            incoming = connection.next() => {
                let Some(envelope) = incoming else {
                    break; // host closed the connection
                };
                match envelope? {
                    Envelope::Binary(data) => {
                        bytes += data.len() as u64;
                        match WireMessage::from_bytes(&data) {
                            Ok(message) => match decoder.apply(&message) {
                                Ok(n) => frames += n as u64,
                                Err(e) => warn!("dropped undecodable frame: {e}"),
                            },
                            Err(e) => warn!("dropped malformed message: {e}"),
                        }
                        let status = format!(
                            "{} | frames: {frames} | rx: {bytes} B | q quits",
                            config.network.host_address
                        );
                        display.render(decoder.framebuffer(), &status)?;
                    }
                    Envelope::Text(text) => {
                        debug!("host says: {text}");
                    }
                }
            }
            key = keys.next() => {
                let Some(event) = key else { break };
                match event? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if !handle_key(key, &config, &mut connection).await? {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

/// Map a key press to a control message; returns `false` to quit.
async fn handle_key(
    key: KeyEvent,
    config: &ViewerConfig,
    connection: &mut Framed<TcpStream, ViewerCodec>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let button = |pin, action| ButtonEvent { pin, action };

    let event = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
        KeyCode::Char('p') => {
            connection.send(Envelope::Text("ping".into())).await?;
            return Ok(true);
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            button(config.input.ok_pin, ButtonAction::Click)
        }
        KeyCode::Char('o') => button(config.input.ok_pin, ButtonAction::LongPress),
        KeyCode::Left => button(config.input.left_pin, ButtonAction::Click),
        KeyCode::Right => button(config.input.right_pin, ButtonAction::Click),
        _ => return Ok(true),
    };

    connection
        .send(Envelope::Text(event.to_control_string()))
        .await?;
    Ok(true)
}
