use super::traits::{Candidate, RejectReason, SampleFilter};

/// Rejects displacements too short to be real motion.
///
/// The brightest-pixel heuristic wanders by a few pixels under lighting
/// flicker even when nothing moves.
pub struct MinDistanceFilter {
    min_distance_px: f64,
}

impl MinDistanceFilter {
    pub fn new(min_distance_px: f64) -> Self {
        Self { min_distance_px }
    }
}

impl SampleFilter for MinDistanceFilter {
    fn check(&self, candidate: &Candidate, _last_accepted_kmh: Option<f64>) -> Result<(), RejectReason> {
        if candidate.distance_px < self.min_distance_px {
            return Err(RejectReason::BelowMinDistance {
                distance_px: candidate.distance_px,
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "min_distance"
    }
}
