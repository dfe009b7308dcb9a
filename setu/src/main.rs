//! Setu - remote-control bridge daemon
//!
//! Runs the remote server against the bundled mock engine at a fixed tick
//! rate, so a client can be developed and tested without the real
//! physics/rendering engine.
//!
//! ```bash
//! setu                          # defaults: 127.0.0.1:1050, output in .
//! setu -c setu.toml --port 6000
//! RUST_LOG=debug setu --output-dir /tmp/captures
//! ```

use clap::Parser;
use setu::error::{Error, Result};
use setu::{AppConfig, MockEngine, RemoteServer, SaveDecision};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

/// Remote-control bridge for a real-time simulation/render loop
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    address: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the snapshot/video output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(address) = &args.address {
        config.network.address = address.clone();
    }
    if let Some(port) = args.port {
        config.network.port = port;
    }
    if let Some(dir) = &args.output_dir {
        config.capture.output_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // RUST_LOG overrides the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("Setu v{} starting...", env!("CARGO_PKG_VERSION"));
    match &args.config {
        Some(path) => log::info!("Using config: {}", path.display()),
        None => log::info!("Using default configuration"),
    }

    let mut engine = MockEngine::new(&config.mock);
    log::info!(
        "Mock engine: nqpos={} nmocap={} ncamera={} {}x{}",
        config.mock.nqpos,
        config.mock.nmocap,
        config.mock.ncamera,
        config.mock.width,
        config.mock.height
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut server = RemoteServer::start(&config)?;
    log::info!(
        "Setu running at {} Hz. Press Ctrl-C to stop.",
        config.host.tick_rate_hz
    );

    let frame = config.host.tick_interval();
    let mut result = Ok(());

    while running.load(Ordering::Relaxed) {
        let started = Instant::now();

        match server.tick(&mut engine, started) {
            Ok(report) => {
                if report.disconnected && report.session.is_none() {
                    log::info!("Waiting for client on {}", server.local_addr());
                }
                if report.connected {
                    log::info!("Serving session {:?}", report.session);
                }
                if report.failed_commands > 0 {
                    log::debug!(
                        "{} of {} commands failed this tick",
                        report.failed_commands,
                        report.commands
                    );
                }
            }
            Err(e) => {
                log::error!("Tick failed: {}", e);
                result = Err(e);
                break;
            }
        }

        if let Some(answer) = config.host.save_answer
            && server.save_prompt_pending()
        {
            server.answer_save_prompt(answer);
            if answer == SaveDecision::Quit {
                log::info!("Client asked to quit");
                break;
            }
        }

        if let Some(remaining) = frame.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }

    log::info!("Shutting down...");
    server.shutdown(&mut engine);
    log::info!("Setu stopped");
    result
}
