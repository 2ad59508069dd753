use std::fmt;

use ball_speed_common::config::DisplayConfig;
use tracing::debug;

use crate::estimator::SpeedSample;

/// What the speed readout currently shows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum DisplayValue {
    /// Nothing measured recently. Rendered as `"0"`.
    #[default]
    Resting,
    Speed(f64),
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resting => f.write_str("0"),
            Self::Speed(kmh) => write!(f, "{kmh:.2}"),
        }
    }
}

/// A single pending deadline. Arming replaces the previous deadline, so
/// timers never stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecayTimer {
    deadline_ms: Option<i64>,
}

impl DecayTimer {
    pub fn arm(&mut self, deadline_ms: i64) {
        self.deadline_ms = Some(deadline_ms);
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn deadline_ms(&self) -> Option<i64> {
        self.deadline_ms
    }

    /// Returns `true` exactly once, on the first call at or after the deadline.
    pub fn fire_if_due(&mut self, now_ms: i64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}

/// Result of offering one tick's sample to the policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayUpdate {
    pub value: DisplayValue,
    /// `true` if this tick's sample replaced the readout.
    pub updated: bool,
}

/// Decides when an accepted speed replaces the readout, and when the
/// readout decays back to rest.
pub struct DisplayPolicy {
    hold_ms: Option<i64>,
    update_interval_ms: Option<i64>,
    shown: DisplayValue,
    last_update_ms: Option<i64>,
    decay: DecayTimer,
}

impl DisplayPolicy {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            hold_ms: config.hold.then(|| millis(config.speed_hold_ms)),
            update_interval_ms: config
                .throttle
                .then(|| millis(config.speed_update_interval_ms)),
            shown: DisplayValue::Resting,
            last_update_ms: None,
            decay: DecayTimer::default(),
        }
    }

    pub fn value(&self) -> DisplayValue {
        self.shown
    }

    pub fn last_update_ms(&self) -> Option<i64> {
        self.last_update_ms
    }

    pub fn decay_deadline(&self) -> Option<i64> {
        self.decay.deadline_ms()
    }

    /// Fire the decay timer if it is due.
    pub fn poll(&mut self, now_ms: i64) -> DisplayValue {
        if self.decay.fire_if_due(now_ms) {
            debug!(now_ms, "speed hold expired, resetting display");
            self.shown = DisplayValue::Resting;
        }
        self.shown
    }

    /// Offer an accepted sample. Returns `true` if it is now on display,
    /// `false` if the throttle suppressed it.
    fn offer(&mut self, sample: &SpeedSample, now_ms: i64) -> bool {
        if let (Some(interval), Some(last)) = (self.update_interval_ms, self.last_update_ms) {
            let since_last_ms = now_ms.saturating_sub(last);
            if since_last_ms < interval {
                debug!(
                    since_last_ms,
                    interval_ms = interval,
                    "display update throttled"
                );
                return false;
            }
        }

        self.shown = DisplayValue::Speed(sample.speed_kmh);
        self.last_update_ms = Some(now_ms);
        self.decay.cancel();
        if let Some(hold) = self.hold_ms {
            self.decay.arm(now_ms.saturating_add(hold));
        }
        true
    }

    /// Per-tick entry point: fire an expired timer, then offer the sample if
    /// there is one.
    pub fn on_sample(&mut self, sample: Option<&SpeedSample>, now_ms: i64) -> DisplayUpdate {
        self.poll(now_ms);
        let updated = sample.is_some_and(|sample| self.offer(sample, now_ms));
        DisplayUpdate {
            value: self.shown,
            updated,
        }
    }

    /// Back to rest with no pending timer, as on session start or stop.
    pub fn reset(&mut self) {
        self.shown = DisplayValue::Resting;
        self.last_update_ms = None;
        self.decay.cancel();
    }
}

fn millis(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}
