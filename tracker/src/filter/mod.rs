pub mod distance;
pub mod jump;
pub mod traits;

use ball_speed_common::config::TrackerConfig;

pub use distance::MinDistanceFilter;
pub use jump::JumpFilter;
pub use traits::{Candidate, RejectReason, SampleFilter};

/// Build the enabled filters in application order: distance floor, then jump.
pub fn chain_from_config(config: &TrackerConfig) -> Vec<Box<dyn SampleFilter>> {
    let mut chain: Vec<Box<dyn SampleFilter>> = Vec::new();
    if config.distance_filter {
        chain.push(Box::new(MinDistanceFilter::new(config.min_distance_px)));
    }
    if config.jump_filter {
        chain.push(Box::new(JumpFilter::new(config.max_plausible_delta_kmh)));
    }
    chain
}
