use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vibebeats::camera::CameraManager;
use vibebeats::config::{AppConfig, Args};
use vibebeats::error::{self, Result};
use vibebeats::player::try_open_audio;
use vibebeats::ui::VibeBeatsApp;
use vibebeats::worker::spawn_worker;

/// Initializes the logging system (file only, no console output)
fn init_logging(path: &Path) -> Result<()> {
    let log_file = std::fs::File::create(path).map_err(error::VibeBeatsError::Io)?;

    let file_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let config = AppConfig::from(Args::parse());
    init_logging(&config.log_file)?;
    info!("Starting VibeBeats");

    // Models load on the worker while the window comes up
    let worker = spawn_worker(config.clone())?;

    let camera = match CameraManager::new(&config.camera) {
        Ok(mut camera) => match camera.ensure_stream_open() {
            Ok(()) => Some(camera),
            Err(e) => {
                error!("Camera stream failed: {}", e);
                None
            }
        },
        Err(e) => {
            error!("Camera initialization failed: {}", e);
            None
        }
    };

    let audio = try_open_audio();

    let result = eframe::run_native(
        "VibeBeats",
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([960.0, 760.0])
                .with_title("VibeBeats"),
            ..Default::default()
        },
        Box::new(move |_cc| {
            Ok(Box::new(VibeBeatsApp::new(
                camera,
                config.camera.capture_size,
                worker,
                audio,
                &config.search.genre,
                config.search.relay.is_some(),
            )))
        }),
    );

    if let Err(e) = result {
        error!("Application error: {}", e);
    }

    Ok(())
}
