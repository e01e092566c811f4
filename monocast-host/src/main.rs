//! monocast host daemon — entry point.
//!
//! ```text
//! monocast-host                  Run with defaults / monocast-host.toml
//! monocast-host --config <path>  Load a custom config TOML
//! monocast-host --listen <addr>  Override the listen address
//! monocast-host --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use monocast_host::config::HostConfig;
use monocast_host::service::HostService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "monocast-host", about = "monocast display mirror daemon")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "monocast-host.toml")]
    config: PathBuf,

    /// Listen address (overrides config). Example: 0.0.0.0:7411
    #[arg(short, long)]
    listen: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&HostConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let mut config = HostConfig::load(&cli.config);
    if let Some(listen) = cli.listen {
        config.network.listen_addr = listen;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("monocast-host v{}", env!("CARGO_PKG_VERSION"));
    info!("listen address: {}", config.network.listen_addr);
    info!(
        "display: {}x{}",
        config.display.width, config.display.height
    );
    info!(
        "stream: interval={}ms compression={} delta={} batch={}",
        config.stream.frame_interval_ms,
        config.stream.use_compression,
        config.stream.use_delta_frames,
        config.stream.batch_size
    );

    let service = HostService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}
