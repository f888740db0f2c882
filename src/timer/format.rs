// Countdown text helpers

use super::phase::TimerPhase;

/// Shown when a room has no descriptor at all.
pub const NO_ROUND_TEXT: &str = "--:--";

/// Render remaining time as `M:SS`, rounding partial seconds up so the
/// display reads `0:01` until the very last millisecond.
pub fn format_remaining(remaining_ms: i64) -> String {
    if remaining_ms <= 0 {
        return "0:00".to_string();
    }
    let total_seconds = ceil_seconds(remaining_ms);
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{}:{:02}", minutes, seconds)
}

/// Whole seconds in `ms`, rounding any partial second up.
pub fn ceil_seconds(ms: i64) -> i64 {
    ms / 1000 + i64::from(ms % 1000 > 0)
}

/// Banner text for a phase. Idle has none.
pub fn phase_label(phase: TimerPhase) -> &'static str {
    match phase {
        TimerPhase::Idle => "",
        TimerPhase::Prep => "GET READY",
        TimerPhase::Climb => "CLIMB",
        TimerPhase::Stopped => "STOPPED",
    }
}

/// Split seconds into hours, minutes, seconds.
pub fn seconds_to_hms(total_seconds: u64) -> (u64, u64, u64) {
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    (h, m, s)
}

pub fn hms_to_seconds(h: u64, m: u64, s: u64) -> u64 {
    h.saturating_mul(3600)
        .saturating_add(m.saturating_mul(60))
        .saturating_add(s)
}

/// Render seconds as `H:MM:SS`, the operator-facing duration format.
pub fn format_hms(total_seconds: u64) -> String {
    let (h, m, s) = seconds_to_hms(total_seconds);
    format!("{}:{:02}:{:02}", h, m, s)
}

/// Parse an operator duration: `SS`, `M:SS` or `H:MM:SS`.
///
/// Minutes and seconds after the leading field must be below 60.
pub fn parse_hms(text: &str) -> Option<u64> {
    let fields = text
        .trim()
        .split(':')
        .map(|field| field.trim().parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;

    match fields.as_slice() {
        [s] => Some(*s),
        [m, s] if *s < 60 => Some(hms_to_seconds(0, *m, *s)),
        [h, m, s] if *m < 60 && *s < 60 => Some(hms_to_seconds(*h, *m, *s)),
        _ => None,
    }
}
