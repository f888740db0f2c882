// ClockCalibrator - one-shot offset against the authoritative clock
//
// A single probe measures the round trip and assumes the server read its
// clock halfway through it. Displays then tick on `AdjustedClock`.

use serde::{Deserialize, Serialize};

use super::probe::TimeProbe;
use super::source::TimeSource;
use crate::error::{log_calibration_error, CalibrationError, ErrorCode};
use crate::telemetry;

/// Signed difference `authoritative_now - local_now`, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockOffset(pub i64);

impl ClockOffset {
    pub const ZERO: ClockOffset = ClockOffset(0);

    pub fn millis(self) -> i64 {
        self.0
    }
}

/// Single-probe clock offset estimator.
///
/// Records local time before and after one round trip and assumes the
/// request and response legs took equally long. Asymmetric routes skew the
/// result by half the asymmetry; that error is accepted rather than corrected
/// with multi-sample filtering.
pub struct ClockCalibrator<P, S> {
    probe: P,
    source: S,
}

impl<P: TimeProbe, S: TimeSource> ClockCalibrator<P, S> {
    pub fn new(probe: P, source: S) -> Self {
        Self { probe, source }
    }

    /// Measure the offset with one probe.
    ///
    /// `offset = server_time + (t1 - t0) / 2 - t1`
    pub async fn calibrate(&self) -> Result<ClockOffset, CalibrationError> {
        let t0 = self.source.now_ms();
        let server_time = self.probe.server_time_ms().await?;
        let t1 = self.source.now_ms();

        let latency = (t1 - t0) / 2;
        let offset = ClockOffset(server_time + latency - t1);

        log::info!(
            "[Clock] Calibrated offset={}ms (round trip {}ms)",
            offset.0,
            t1 - t0
        );
        telemetry::hub().record_calibration(offset.0, t1 - t0);
        Ok(offset)
    }

    /// Calibrate, degrading to a zero offset on failure.
    ///
    /// The failure is logged and counted but never returned: a display on
    /// unsynced local time is better than no display.
    pub async fn calibrate_or_default(&self) -> ClockOffset {
        match self.calibrate().await {
            Ok(offset) => offset,
            Err(err) => {
                log_calibration_error(&err, "calibrate_or_default");
                telemetry::hub().record_error(
                    telemetry::DiagnosticError::Calibration,
                    err.message(),
                );
                ClockOffset::ZERO
            }
        }
    }
}

/// Local clock shifted onto the authoritative time line.
pub struct AdjustedClock<S> {
    source: S,
    offset: ClockOffset,
}

impl<S: TimeSource> AdjustedClock<S> {
    pub fn new(source: S, offset: ClockOffset) -> Self {
        Self { source, offset }
    }

    /// Unsynced clock, used before or instead of calibration.
    pub fn unsynced(source: S) -> Self {
        Self::new(source, ClockOffset::ZERO)
    }

    pub fn adjusted_now(&self) -> i64 {
        self.source.now_ms() + self.offset.0
    }

    pub fn offset(&self) -> ClockOffset {
        self.offset
    }

    /// Replace the offset after a later calibration.
    pub fn set_offset(&mut self, offset: ClockOffset) {
        self.offset = offset;
    }
}
