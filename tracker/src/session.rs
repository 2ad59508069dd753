use ball_speed_common::config::{DisplayConfig, TrackerConfig};
use ball_speed_common::frame::RgbaFrame;
use serde::Serialize;
use tracing::{debug, info};

use crate::detector::{self, Detector, Point};
use crate::display::{DisplayPolicy, DisplayValue};
use crate::estimator::{Estimate, MotionEstimator, SpeedSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Measuring { started_at_ms: i64 },
}

/// Everything one tick produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    /// Detected ball position, `None` while idle.
    pub detection: Option<Point>,
    /// Accepted sample, before the display throttle.
    pub sample: Option<SpeedSample>,
    /// `true` if `sample` made it onto the readout.
    pub displayed: bool,
    pub display: DisplayValue,
}

/// One line of output per displayed speed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedEvent {
    pub speed_kmh: String,
    pub timestamp_ms: i64,
    pub x: u32,
    pub y: u32,
}

impl SpeedEvent {
    pub fn new(sample: &SpeedSample, at: Point) -> Self {
        Self {
            speed_kmh: sample.formatted(),
            timestamp_ms: sample.timestamp_ms,
            x: at.x,
            y: at.y,
        }
    }
}

/// The per-frame pipeline: detector, motion estimator and display policy,
/// gated by the measuring toggle.
///
/// Starting or stopping clears every piece of rolling state in one call, so
/// no observation survives a stop/start boundary.
pub struct SpeedSession {
    state: SessionState,
    detector: Box<dyn Detector>,
    estimator: MotionEstimator,
    display: DisplayPolicy,
    last_detection: Option<Point>,
}

impl SpeedSession {
    pub fn new(
        detector: Box<dyn Detector>,
        tracker: &TrackerConfig,
        display: &DisplayConfig,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            detector,
            estimator: MotionEstimator::new(tracker),
            display: DisplayPolicy::new(display),
            last_detection: None,
        }
    }

    pub fn from_config(tracker: &TrackerConfig, display: &DisplayConfig) -> Self {
        Self::new(detector::from_config(tracker), tracker, display)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_measuring(&self) -> bool {
        matches!(self.state, SessionState::Measuring { .. })
    }

    pub fn start(&mut self, now_ms: i64) {
        self.clear_rolling_state();
        self.estimator.start(now_ms);
        self.state = SessionState::Measuring {
            started_at_ms: now_ms,
        };
        info!(detector = self.detector.name(), now_ms, "measurement started");
    }

    pub fn stop(&mut self, now_ms: i64) {
        self.clear_rolling_state();
        if let SessionState::Measuring { started_at_ms } = self.state {
            info!(duration_ms = now_ms - started_at_ms, "measurement stopped");
        }
        self.state = SessionState::Idle;
    }

    /// Flip the measuring state. Returns the new `is_measuring()`.
    pub fn toggle(&mut self, now_ms: i64) -> bool {
        if self.is_measuring() {
            self.stop(now_ms);
        } else {
            self.start(now_ms);
        }
        self.is_measuring()
    }

    fn clear_rolling_state(&mut self) {
        self.estimator.reset();
        self.display.reset();
        self.last_detection = None;
    }

    /// Run the pipeline once for a frame observed at `now_ms`.
    ///
    /// While idle the frame is ignored entirely.
    pub fn tick(&mut self, frame: &RgbaFrame, now_ms: i64) -> TickOutcome {
        if !self.is_measuring() {
            return TickOutcome {
                detection: None,
                sample: None,
                displayed: false,
                display: self.display.poll(now_ms),
            };
        }

        let detection = self.detector.detect(frame);
        self.last_detection = Some(detection);

        let estimate = self.estimator.evaluate(detection, now_ms);
        if let Estimate::Accepted(sample) = estimate {
            debug!(
                x = detection.x,
                y = detection.y,
                speed_kmh = %sample.formatted(),
                "speed accepted"
            );
        }
        let sample = estimate.sample();

        let update = self.display.on_sample(sample.as_ref(), now_ms);

        TickOutcome {
            detection: Some(detection),
            sample,
            displayed: update.updated,
            display: update.value,
        }
    }

    /// Fire the decay timer without a frame.
    pub fn poll(&mut self, now_ms: i64) -> DisplayValue {
        self.display.poll(now_ms)
    }

    pub fn display(&self) -> DisplayValue {
        self.display.value()
    }

    /// Most recent detection, for drawing the overlay.
    pub fn last_detection(&self) -> Option<Point> {
        self.last_detection
    }

    pub fn decay_deadline(&self) -> Option<i64> {
        self.display.decay_deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::brightest::tests::frame_with;
    use crate::detector::BrightestPixelDetector;

    fn session() -> SpeedSession {
        SpeedSession::new(
            Box::new(BrightestPixelDetector),
            &TrackerConfig::default(),
            &DisplayConfig::default(),
        )
    }

    fn ball_at(x: u32, y: u32) -> RgbaFrame {
        frame_with(400, 300, &[(x, y, [255, 255, 255])])
    }

    #[test]
    fn idle_ticks_have_no_effect() {
        let mut session = session();
        let outcome = session.tick(&ball_at(10, 10), 1_000);
        assert_eq!(outcome.detection, None);
        assert_eq!(outcome.sample, None);
        assert_eq!(outcome.display, DisplayValue::Resting);
        assert_eq!(session.last_detection(), None);

        // The idle frame must not have primed the estimator.
        session.start(2_000);
        assert_eq!(session.tick(&ball_at(110, 10), 3_000).sample, None);
    }

    #[test]
    fn warm_up_then_known_speed() {
        let mut session = session();
        session.start(0);
        assert_eq!(session.tick(&ball_at(0, 0), 200).sample, None);
        assert_eq!(session.tick(&ball_at(200, 0), 500).sample, None);

        // Past the window, but the ball has not moved since the last frame.
        assert_eq!(session.tick(&ball_at(200, 0), 1_000).sample, None);
        let outcome = session.tick(&ball_at(300, 0), 2_000);
        assert!(outcome.displayed);
        assert_eq!(outcome.detection, Some(Point::new(300, 0)));
        assert_eq!(outcome.display.to_string(), "14.14");
        assert_eq!(session.display().to_string(), "14.14");
    }

    #[test]
    fn jitter_leaves_display_unchanged() {
        let mut session = session();
        session.start(0);
        session.tick(&ball_at(0, 0), 1_000);
        let outcome = session.tick(&ball_at(5, 5), 1_500);
        assert_eq!(outcome.sample, None);
        assert_eq!(outcome.display, DisplayValue::Resting);
        assert_eq!(session.last_detection(), Some(Point::new(5, 5)));
    }

    #[test]
    fn display_decays_without_frames() {
        let mut session = session();
        session.start(0);
        session.tick(&ball_at(0, 0), 1_000);
        session.tick(&ball_at(100, 0), 2_000);
        assert_eq!(session.decay_deadline(), Some(7_000));
        assert_eq!(session.poll(6_999).to_string(), "14.14");
        assert_eq!(session.poll(7_000).to_string(), "0");
    }

    #[test]
    fn stop_then_start_forces_warm_up() {
        let mut session = session();
        session.start(0);
        session.tick(&ball_at(0, 0), 1_000);
        session.tick(&ball_at(100, 0), 2_000);

        assert!(!session.toggle(2_500));
        assert_eq!(session.display(), DisplayValue::Resting);
        assert_eq!(session.decay_deadline(), None);
        assert_eq!(session.last_detection(), None);

        assert!(session.toggle(3_000));
        // Well past the warm-up delay relative to the old session, but the
        // first tick of a new session only primes.
        assert_eq!(session.tick(&ball_at(300, 0), 10_000).sample, None);
        assert!(session.tick(&ball_at(400, 0), 11_000).sample.is_some());
    }

    #[test]
    fn restart_while_measuring_resets() {
        let mut session = session();
        session.start(0);
        session.tick(&ball_at(0, 0), 1_000);
        session.tick(&ball_at(100, 0), 2_000);
        session.start(2_100);
        assert_eq!(session.state(), SessionState::Measuring { started_at_ms: 2_100 });
        assert_eq!(session.display(), DisplayValue::Resting);
        assert_eq!(session.tick(&ball_at(200, 0), 4_000).sample, None);
    }

    #[test]
    fn throttled_sample_is_reported_but_not_displayed() {
        let display = DisplayConfig {
            throttle: true,
            speed_update_interval_ms: 5_000,
            ..DisplayConfig::default()
        };
        let mut session = SpeedSession::new(
            Box::new(BrightestPixelDetector),
            &TrackerConfig::default(),
            &display,
        );
        session.start(0);
        session.tick(&ball_at(0, 0), 1_000);
        assert!(session.tick(&ball_at(100, 0), 2_000).displayed);
        let outcome = session.tick(&ball_at(200, 0), 3_000);
        assert!(outcome.sample.is_some());
        assert!(!outcome.displayed);
        assert_eq!(outcome.display.to_string(), "14.14");
    }

    #[test]
    fn speed_event_serializes_formatted_speed() {
        let sample = SpeedSample {
            speed_kmh: 14.14,
            timestamp_ms: 2_000,
        };
        let event = SpeedEvent::new(&sample, Point::new(100, 0));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"speed_kmh":"14.14","timestamp_ms":2000,"x":100,"y":0}"#
        );
    }
}
