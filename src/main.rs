// src/main.rs
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use anyhow::{anyhow, Context};
use eframe::egui;
use sweepscope::config::{config_from_env, ScopeConfig};
use sweepscope::engine;
use sweepscope::gui::ScopeApp;
use sweepscope::scope::{PngScreen, Poller, RecordingScreen, WebSocketTransport};

/// Polls without a window and rewrites the PNG after every cycle.
fn run_headless(
    config: ScopeConfig,
    transport: WebSocketTransport,
    path: PathBuf,
) -> anyhow::Result<()> {
    log::info!("headless mode, writing {}", path.display());
    let screen = PngScreen::new(path, config.canvas_width, config.canvas_height)
        .context("failed to set up the snapshot canvas")?;
    let screen = Arc::new(Mutex::new(screen));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(async {
        let mut poller = Poller::from_config(&config, transport, screen)?;
        let handle = poller.start();
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
        poller.stop(handle);
        Ok::<(), anyhow::Error>(())
    })
}
fn run_window(config: ScopeConfig, transport: WebSocketTransport) -> anyhow::Result<()> {
    let screen = Arc::new(Mutex::new(RecordingScreen::new(
        config.canvas_width as f64,
        config.canvas_height as f64,
    )));
    let (tx, rx) = mpsc::channel();
    let (tx_cmd, rx_cmd) = tokio::sync::mpsc::unbounded_channel();
    let worker = engine::spawn_thread(config.clone(), transport, Arc::clone(&screen), tx, rx_cmd);
    let app = ScopeApp::new(&config, screen, tx_cmd, rx);
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([config.canvas_width as f32, config.canvas_height as f32 + 90.0])
        .with_title("sweepscope");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native("sweepscope", options, Box::new(|_cc| Box::new(app)))
        .map_err(|e| anyhow!("viewer window failed: {e}"))?;
    // The app (and with it the command sender) is gone, so the worker winds down.
    if worker.join().is_err() {
        log::error!("poller thread panicked");
    }
    Ok(())
}
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = config_from_env().context("failed to load viewer configuration")?;
    let transport = WebSocketTransport::from_config(&config);
    match config.snapshot_path.clone() {
        Some(path) => run_headless(config, transport, path),
        None => run_window(config, transport),
    }
}
