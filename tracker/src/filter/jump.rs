use super::traits::{Candidate, RejectReason, SampleFilter};

/// Rejects a speed that differs implausibly from the last accepted one.
pub struct JumpFilter {
    max_delta_kmh: f64,
}

impl JumpFilter {
    pub fn new(max_delta_kmh: f64) -> Self {
        Self { max_delta_kmh }
    }
}

impl SampleFilter for JumpFilter {
    fn check(&self, candidate: &Candidate, last_accepted_kmh: Option<f64>) -> Result<(), RejectReason> {
        let Some(previous) = last_accepted_kmh else {
            return Ok(());
        };
        let delta_kmh = (candidate.speed_kmh - previous).abs();
        if delta_kmh > self.max_delta_kmh {
            return Err(RejectReason::ImplausibleJump { delta_kmh });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "jump"
    }
}
