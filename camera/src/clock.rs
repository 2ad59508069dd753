use std::time::Duration;
use tokio::time::Instant;

/// Monotonic milliseconds since the driver started.
///
/// Every tick, command and decay deadline is measured on this timeline, so a
/// wall-clock step cannot stall the estimator or stretch the hold. Wall time
/// is kept only for naming snapshots.
#[derive(Debug, Clone, Copy)]
pub struct DriverClock {
    epoch: Instant,
}

impl DriverClock {
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.ms_at(Instant::now())
    }

    fn ms_at(&self, instant: Instant) -> i64 {
        let elapsed = instant.saturating_duration_since(self.epoch);
        i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
    }

    /// The instant a timeline value falls on. Values before the epoch map to
    /// the epoch; `None` if the value lies beyond what `Instant` can hold.
    pub fn instant_at(&self, ms: i64) -> Option<Instant> {
        let offset = Duration::from_millis(u64::try_from(ms).unwrap_or(0));
        self.epoch.checked_add(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_starts_at_zero() {
        let clock = DriverClock::start();
        assert_eq!(clock.ms_at(clock.epoch), 0);
        assert_eq!(clock.instant_at(0), Some(clock.epoch));
    }

    #[test]
    fn timeline_round_trips_through_instants() {
        let clock = DriverClock::start();
        let at = clock.instant_at(5_000).unwrap();
        assert_eq!(at - clock.epoch, Duration::from_millis(5_000));
        assert_eq!(clock.ms_at(at), 5_000);
    }

    #[test]
    fn instants_before_epoch_clamp() {
        let clock = DriverClock::start();
        assert_eq!(clock.instant_at(-250), Some(clock.epoch));
        if let Some(earlier) = clock.epoch.checked_sub(Duration::from_millis(10)) {
            assert_eq!(clock.ms_at(earlier), 0);
        }
    }

    #[test]
    fn now_never_goes_backwards() {
        let clock = DriverClock::start();
        let first = clock.now_ms();
        std::thread::sleep(Duration::from_millis(5));
        let second = clock.now_ms();
        assert!(first >= 0);
        assert!(second >= first + 5);
    }
}
