mod clock;
mod commands;
mod driver;
mod mjpeg;

use ball_speed_common::config::Config;
use ball_speed_tracker::SpeedSession;
use clock::DriverClock;
use driver::Driver;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("HTTP connection failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP stream error: {0}")]
    HttpStream(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("driver stopped accepting frames")]
    DriverGone,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        url = %config.stream.url,
        mode = %config.stream.mode,
        detector = ?config.tracker.detector,
        camera_angle_deg = config.tracker.camera_angle_deg,
        hold = config.display.hold,
        throttle = config.display.throttle,
        "starting ball-speed camera"
    );

    let snapshot_dir = config.session.snapshot_dir.as_ref().map(PathBuf::from);
    if let Some(dir) = &snapshot_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            error!(error = %e, path = %dir.display(), "failed to create snapshot directory");
            std::process::exit(1);
        }
    }

    let clock = DriverClock::start();
    let mut session = SpeedSession::from_config(&config.tracker, &config.display);
    if config.session.auto_start {
        session.start(clock.now_ms());
    }

    // Capacity 1: the driver never works through a backlog of stale frames.
    let (frame_tx, frame_rx) = mpsc::channel(1);
    let (command_tx, command_rx) = mpsc::channel(8);

    tokio::spawn(commands::read_stdin(command_tx));

    match config.stream.mode.as_str() {
        "mjpeg" => {
            let url = format!(
                "{}?quality={}&fps={}",
                config.stream.url, config.stream.quality, config.stream.fps
            );
            tokio::spawn(async move {
                if let Err(e) = mjpeg::run_mjpeg_source(url, frame_tx, clock).await {
                    info!(reason = %e, "MJPEG source finished");
                }
            });
        }
        "polling" => {
            let url = format!(
                "{}?quality={}",
                config.stream.url.replace("/stream", "/frame"),
                config.stream.quality
            );
            let interval = Duration::from_secs_f64(1.0 / config.stream.fps);
            tokio::spawn(async move {
                if let Err(e) = mjpeg::run_polling_source(url, frame_tx, interval, clock).await {
                    info!(reason = %e, "polling source finished");
                }
            });
        }
        other => {
            error!(mode = other, "unknown stream mode, expected 'mjpeg' or 'polling'");
            std::process::exit(1);
        }
    }

    info!("send start, stop or an empty line on stdin to toggle measuring, quit to exit");
    Driver::new(session, snapshot_dir, clock)
        .run(frame_rx, command_rx)
        .await;
}
