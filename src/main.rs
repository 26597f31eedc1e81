mod app;
mod config;
mod hub;
mod logger;
mod net;
mod plotter;
mod recorder;
mod stream;
mod types;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use eframe::egui;
use log::{error, info, warn};

use app::ViewerApp;
use config::AppConfig;
use hub::SnapshotHub;
use recorder::RecorderHandle;

const CONFIG_PATH: &str = "config.toml";

fn main() {
    logger::init_logger();
    info!("accelscope starting");

    let mut cfg = load_or_init_config(CONFIG_PATH);
    cfg.apply_env_overrides();
    if let Err(e) = cfg.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let shutdown = Arc::new(AtomicBool::new(false));

    // One bounded queue per snapshot consumer, so neither can stall the
    // other or the ingest loop.
    let mut snapshot_hub = SnapshotHub::new();
    let render_rx = snapshot_hub.subscribe(cfg.channels.render_queue);
    let recorder_rx = snapshot_hub.subscribe(cfg.channels.recorder_queue);

    let (control_tx, control_rx) = bounded(cfg.channels.control_queue);
    let (status_tx, status_rx) = bounded(cfg.channels.status_queue);
    let recorder_handle = RecorderHandle::new(control_tx);

    let ingest_shutdown = Arc::clone(&shutdown);
    let net_cfg = cfg.net.clone();
    let buffer_cfg = cfg.buffer.clone();
    let ingest_handle = thread::spawn(move || {
        if let Err(e) = net::run_ingest(net_cfg, buffer_cfg, snapshot_hub, ingest_shutdown) {
            error!("Ingest thread failed: {e}");
        }
    });

    let output_dir = PathBuf::from(&cfg.recording.output_dir);
    let recorder_thread = thread::spawn(move || {
        recorder::run_recorder(control_rx, recorder_rx, output_dir, status_tx);
    });

    let options = eframe::NativeOptions {
        vsync: cfg.window.vsync,
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([cfg.window.width, cfg.window.height])
            .with_resizable(cfg.window.resizable),
        ..Default::default()
    };

    let title = cfg.window.title.clone();
    let ui_recorder = recorder_handle.clone();
    if let Err(e) = eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| {
            Ok(Box::new(ViewerApp::new(
                render_rx,
                ui_recorder,
                status_rx,
                &cfg,
            )))
        }),
    ) {
        error!("GUI failed: {e}");
    }

    // GUI closed: stop ingestion, flush any open recording, join both
    // workers before exiting.
    info!("GUI closed, signaling worker threads to shut down");
    shutdown.store(true, Ordering::Relaxed);
    recorder_handle.shutdown();

    match ingest_handle.join() {
        Ok(()) => info!("Ingest thread shut down gracefully"),
        Err(e) => error!("Ingest thread panicked: {e:?}"),
    }
    match recorder_thread.join() {
        Ok(()) => info!("Recorder thread shut down gracefully"),
        Err(e) => error!("Recorder thread panicked: {e:?}"),
    }
}

/// Loads `config.toml`, writing one with the defaults on first run so the
/// knobs are discoverable.
fn load_or_init_config(path: &str) -> AppConfig {
    if Path::new(path).exists() {
        match AppConfig::load_from_file(path) {
            Ok(cfg) => {
                info!("Loaded configuration from {path}");
                return cfg;
            }
            Err(e) => {
                warn!("Could not read {path}: {e}, using defaults");
                return AppConfig::default();
            }
        }
    }
    let cfg = AppConfig::default();
    match cfg.save_to_file(path) {
        Ok(()) => info!("Wrote default configuration to {path}"),
        Err(e) => warn!("Could not write default configuration: {e}"),
    }
    cfg
}
