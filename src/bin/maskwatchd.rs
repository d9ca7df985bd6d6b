//! maskwatchd - webcam mask-wearing monitor daemon.
//!
//! This daemon:
//! 1. Loads layered configuration (file, environment, CLI overrides)
//! 2. Acquires the configured camera
//! 3. Samples a frame on a fixed interval and submits it to the classifier
//! 4. Renders prediction, confidence, and recommendation on the terminal
//! 5. Releases the camera unconditionally on Ctrl-C

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use maskwatch::{
    CameraConfig, CameraSource, DetectClient, MaskwatchdConfig, Monitor, TerminalPresenter,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Watch a webcam and report mask wearing via a remote classifier"
)]
struct Args {
    /// Classification endpoint URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Camera device path (e.g. /dev/video0) or a stub:// URL.
    #[arg(long)]
    device: Option<String>,

    /// Milliseconds between sampling ticks.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Terminal output mode.
    #[arg(long, value_parser = ["auto", "plain", "pretty"])]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = MaskwatchdConfig::load()?;
    if let Some(endpoint) = args.endpoint {
        cfg.endpoint = endpoint;
    }
    if let Some(device) = args.device {
        cfg.camera.device = device;
    }
    if let Some(interval_ms) = args.interval_ms {
        cfg.sampling.interval_ms = interval_ms;
    }
    cfg.validate()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })?;
    }

    let presenter = TerminalPresenter::from_args(args.ui.as_deref(), std::io::stderr().is_terminal());
    let camera = CameraSource::new(CameraConfig {
        device: cfg.camera.device.clone(),
        width: cfg.camera.width,
        height: cfg.camera.height,
    });
    let client = DetectClient::new(&cfg.endpoint, cfg.request_timeout)?;
    let mut monitor = Monitor::new(cfg.sampling.clone(), camera, client, Box::new(presenter));

    log::info!(
        "maskwatchd running. endpoint={} device={} interval={}ms",
        cfg.endpoint,
        cfg.camera.device,
        cfg.sampling.interval_ms
    );
    monitor.run(&shutdown)?;
    log::info!("maskwatchd exiting");
    Ok(())
}
