// src/main.rs

mod annotate;
mod config;
mod detector;
mod display;
mod playback;
mod source;
mod types;
mod yolo;

use anyhow::Result;
use display::HighguiWindow;
use playback::PlaybackLoop;
use source::VideoFileSource;
use std::time::Instant;
use tracing::{error, info};
use yolo::YoloDetector;

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = types::Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "detection_viewer={},ort=warn",
            config.logging.level
        ))
        .init();

    info!("🎬 Detection Viewer Starting");
    info!("✓ Configuration loaded from {}", config_path);

    let source = match VideoFileSource::open(&config.video.source_path) {
        Ok(source) => source,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let detector = YoloDetector::new(&config.model)?;
    let window = HighguiWindow::open(&config.display.window_name)?;

    let started = Instant::now();
    let stats = PlaybackLoop::new(source, detector, window).run()?;
    let elapsed = started.elapsed().as_secs_f64();

    info!("📊 Final Report:");
    info!("  Frames presented: {}", stats.frames_presented);
    info!("  Stream restarts: {}", stats.rewinds);
    info!("  Detections drawn: {}", stats.detections_drawn);
    if elapsed > 0.0 {
        info!(
            "  Display speed: {:.1} FPS",
            stats.frames_presented as f64 / elapsed
        );
    }

    Ok(())
}
