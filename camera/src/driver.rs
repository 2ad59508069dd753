use std::path::{Path, PathBuf};

use ball_speed_common::frame::{RgbaFrame, TimestampedFrame};
use ball_speed_tracker::overlay::{draw_marker, MARKER_COLOR, MARKER_RADIUS};
use ball_speed_tracker::{Point, SpeedEvent, SpeedSession};
use tokio::sync::mpsc::Receiver;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::DriverClock;
use crate::commands::Command;

/// Owns the session and is the only place it is mutated.
pub struct Driver {
    session: SpeedSession,
    snapshot_dir: Option<PathBuf>,
    clock: DriverClock,
}

impl Driver {
    pub fn new(session: SpeedSession, snapshot_dir: Option<PathBuf>, clock: DriverClock) -> Self {
        Self {
            session,
            snapshot_dir,
            clock,
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &SpeedSession {
        &self.session
    }

    pub fn apply(&mut self, command: Command, now_ms: i64) {
        match command {
            Command::Start => self.session.start(now_ms),
            Command::Stop => self.session.stop(now_ms),
            Command::Toggle => {
                self.session.toggle(now_ms);
            }
            Command::Quit => {}
        }
        info!(
            ?command,
            measuring = self.session.is_measuring(),
            display = %self.session.display(),
            "command applied"
        );
    }

    /// Run one frame through the session. Returns an event when a new speed
    /// went on display.
    pub fn handle_frame(&mut self, frame: TimestampedFrame) -> Option<SpeedEvent> {
        let now = frame.monotonic_ms;
        if !self.session.is_measuring() {
            // Nothing to measure, skip the decode.
            self.poll(now);
            return None;
        }

        let rgba = match frame.decode() {
            Ok(rgba) => rgba,
            Err(e) => {
                warn!(error = %e, seq = frame.seq, "undecodable frame, skipping");
                self.poll(now);
                return None;
            }
        };

        let outcome = self.session.tick(&rgba, now);
        debug!(
            seq = frame.seq,
            bytes = frame.payload_size(),
            x = outcome.detection.map(|p| p.x),
            y = outcome.detection.map(|p| p.y),
            display = %outcome.display,
            "frame processed"
        );
        if !outcome.displayed {
            return None;
        }
        let (sample, detection) = (outcome.sample?, outcome.detection?);
        info!(
            speed_kmh = %sample.formatted(),
            x = detection.x,
            y = detection.y,
            "speed updated"
        );

        if let Some(dir) = &self.snapshot_dir {
            save_snapshot(dir.join(frame.snapshot_name()), rgba, detection);
        }
        Some(SpeedEvent::new(&sample, detection))
    }

    /// Fire the display decay timer if it is due.
    pub fn poll(&mut self, now_ms: i64) {
        let before = self.session.display();
        let after = self.session.poll(now_ms);
        if before != after {
            info!(previous = %before, "speed hold expired, display reset");
        }
    }

    /// When the pending display decay is due, if one is armed.
    pub fn decay_instant(&self) -> Option<Instant> {
        self.session
            .decay_deadline()
            .and_then(|deadline| self.clock.instant_at(deadline))
    }

    /// Main loop: frames, operator commands and the decay deadline, one at a
    /// time, until the operator quits or the frame source goes away.
    pub async fn run(
        mut self,
        mut frames: Receiver<TimestampedFrame>,
        mut commands: Receiver<Command>,
    ) {
        let mut commands_open = true;
        loop {
            let decay = self.decay_instant();

            tokio::select! {
                frame = frames.recv() => {
                    let Some(frame) = frame else {
                        info!("frame source closed, stopping");
                        break;
                    };
                    if let Some(event) = self.handle_frame(frame) {
                        emit(&event);
                    }
                }
                command = commands.recv(), if commands_open => match command {
                    Some(Command::Quit) => {
                        info!("quit requested");
                        break;
                    }
                    Some(command) => self.apply(command, self.clock.now_ms()),
                    None => commands_open = false,
                },
                _ = sleep_or_pending(decay) => self.poll(self.clock.now_ms()),
            }
        }
    }
}

async fn sleep_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Speed events go to stdout as JSON lines; logs go to stderr.
fn emit(event: &SpeedEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "failed to serialize speed event"),
    }
}

fn save_snapshot(path: PathBuf, frame: RgbaFrame, at: Point) {
    let Some(mut img) = frame.into_image() else {
        warn!("frame buffer does not match its dimensions, no snapshot");
        return;
    };
    draw_marker(&mut img, at, MARKER_RADIUS, MARKER_COLOR);
    tokio::task::spawn_blocking(move || write_snapshot(&path, &img));
}

fn write_snapshot(path: &Path, img: &image::RgbaImage) {
    match img.save(path) {
        Ok(()) => debug!(path = %path.display(), "snapshot written"),
        Err(e) => warn!(error = %e, path = %path.display(), "failed to write snapshot"),
    }
}
