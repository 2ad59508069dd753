//! Per-frame ball localization and speed estimation.
//!
//! A host owns a [`SpeedSession`] and calls [`SpeedSession::tick`] once per
//! available frame. Nothing in this crate schedules work on its own: the
//! display decay timer is a deadline the host observes through
//! [`SpeedSession::decay_deadline`] and fires with [`SpeedSession::poll`].

pub mod detector;
pub mod display;
pub mod estimator;
pub mod filter;
pub mod overlay;
pub mod session;

pub use detector::{Detector, Point};
pub use display::{DisplayPolicy, DisplayUpdate, DisplayValue};
pub use estimator::{Estimate, MotionEstimator, Observation, SpeedSample};
pub use session::{SessionState, SpeedEvent, SpeedSession, TickOutcome};
