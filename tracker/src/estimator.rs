use ball_speed_common::config::TrackerConfig;
use serde::Serialize;
use tracing::debug;

use crate::detector::Point;
use crate::filter::{self, Candidate, RejectReason, SampleFilter};

/// A detection and the time it was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub position: Point,
    pub timestamp_ms: i64,
}

/// An accepted speed, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedSample {
    pub speed_kmh: f64,
    pub timestamp_ms: i64,
}

impl SpeedSample {
    /// Speed as shown to the user, e.g. `"14.14"`.
    pub fn formatted(&self) -> String {
        format!("{:.2}", self.speed_kmh)
    }
}

/// Outcome of one estimator step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    /// No previous observation, or still inside the warm-up window.
    WarmingUp,
    /// Elapsed time since the previous observation was not positive.
    Stalled,
    Rejected {
        speed_kmh: f64,
        reason: RejectReason,
    },
    Accepted(SpeedSample),
}

impl Estimate {
    pub fn sample(&self) -> Option<SpeedSample> {
        match self {
            Self::Accepted(sample) => Some(*sample),
            _ => None,
        }
    }
}

/// Turns consecutive detections into speed samples.
///
/// Holds exactly one previous observation. Every call replaces it, whether
/// or not a speed is emitted, so the next displacement is always measured
/// from the latest detection.
pub struct MotionEstimator {
    measure_delay_ms: i64,
    /// Pixels per second to km/h, including the camera angle correction.
    kmh_per_px_per_sec: f64,
    filters: Vec<Box<dyn SampleFilter>>,
    session_start_ms: Option<i64>,
    last_observation: Option<Observation>,
    last_accepted_kmh: Option<f64>,
}

impl MotionEstimator {
    pub fn new(config: &TrackerConfig) -> Self {
        Self::with_filters(config, filter::chain_from_config(config))
    }

    pub fn with_filters(config: &TrackerConfig, filters: Vec<Box<dyn SampleFilter>>) -> Self {
        let angle = config.camera_angle_deg.to_radians();
        Self {
            measure_delay_ms: i64::try_from(config.measure_delay_ms).unwrap_or(i64::MAX),
            kmh_per_px_per_sec: config.pixel_to_kmh_scale / angle.cos(),
            filters,
            session_start_ms: None,
            last_observation: None,
            last_accepted_kmh: None,
        }
    }

    /// Clear all rolling state and begin a new warm-up window at `now_ms`.
    pub fn start(&mut self, now_ms: i64) {
        self.reset();
        self.session_start_ms = Some(now_ms);
    }

    /// Clear all rolling state. Until the next `start`, every update only
    /// stores its observation.
    pub fn reset(&mut self) {
        self.session_start_ms = None;
        self.last_observation = None;
        self.last_accepted_kmh = None;
    }

    pub fn last_observation(&self) -> Option<Observation> {
        self.last_observation
    }

    pub fn last_accepted_kmh(&self) -> Option<f64> {
        self.last_accepted_kmh
    }

    /// Convert a pixel speed to km/h.
    pub fn to_kmh(&self, px_per_sec: f64) -> f64 {
        px_per_sec * self.kmh_per_px_per_sec
    }

    pub fn update(&mut self, position: Point, timestamp_ms: i64) -> Option<SpeedSample> {
        self.evaluate(position, timestamp_ms).sample()
    }

    pub fn evaluate(&mut self, position: Point, timestamp_ms: i64) -> Estimate {
        let current = Observation {
            position,
            timestamp_ms,
        };
        let Some(previous) = self.last_observation.replace(current) else {
            return Estimate::WarmingUp;
        };
        let Some(start_ms) = self.session_start_ms else {
            return Estimate::WarmingUp;
        };
        if timestamp_ms.saturating_sub(start_ms) < self.measure_delay_ms {
            return Estimate::WarmingUp;
        }

        let elapsed_ms = timestamp_ms.saturating_sub(previous.timestamp_ms);
        if elapsed_ms <= 0 {
            debug!(elapsed_ms, "non-positive elapsed time, skipping");
            return Estimate::Stalled;
        }

        let distance_px = previous.position.distance_to(&position);
        let px_per_sec = distance_px / (elapsed_ms as f64 / 1000.0);
        let candidate = Candidate {
            distance_px,
            speed_kmh: self.to_kmh(px_per_sec),
        };

        for filter in &self.filters {
            if let Err(reason) = filter.check(&candidate, self.last_accepted_kmh) {
                debug!(
                    filter = filter.name(),
                    speed_kmh = candidate.speed_kmh,
                    %reason,
                    "speed rejected"
                );
                return Estimate::Rejected {
                    speed_kmh: candidate.speed_kmh,
                    reason,
                };
            }
        }

        let speed_kmh = round_hundredths(candidate.speed_kmh);
        self.last_accepted_kmh = Some(speed_kmh);
        Estimate::Accepted(SpeedSample {
            speed_kmh,
            timestamp_ms,
        })
    }
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
