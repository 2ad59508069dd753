use std::fmt;

/// A speed computed from two consecutive observations, before filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub distance_px: f64,
    pub speed_kmh: f64,
}

/// Why a candidate speed was vetoed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    BelowMinDistance { distance_px: f64 },
    ImplausibleJump { delta_kmh: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMinDistance { distance_px } => {
                write!(f, "moved {distance_px:.2}px, below minimum distance")
            }
            Self::ImplausibleJump { delta_kmh } => {
                write!(f, "changed by {delta_kmh:.2} km/h since last accepted speed")
            }
        }
    }
}

/// Outlier rejection rule applied to every candidate speed.
///
/// Filters are stateless; the estimator hands them the last accepted speed.
pub trait SampleFilter: Send + Sync {
    /// `Ok(())` lets the candidate through, `Err` vetoes it.
    fn check(&self, candidate: &Candidate, last_accepted_kmh: Option<f64>)
        -> Result<(), RejectReason>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}
