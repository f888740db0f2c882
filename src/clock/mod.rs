//! Clock calibration against the authoritative server clock.
//!
//! Each display session measures its offset from the server once, before the
//! scheduling loop starts, and from then on reads time through an
//! [`AdjustedClock`]. Calibration is best-effort: a failed probe degrades to
//! an offset of zero instead of blocking the countdown.

pub mod calibrator;
pub mod probe;
pub mod source;

pub use calibrator::{AdjustedClock, ClockCalibrator, ClockOffset};
pub use probe::{HttpTimeProbe, ServerTimeResponse, TimeProbe};
pub use source::{ManualTimeSource, SystemTimeSource, TimeSource};
