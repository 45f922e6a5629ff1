//! `HH:MM:SS` rendering of second counts.

/// Format a duration in seconds as zero-padded `HH:MM:SS`.
///
/// Hours are unbounded (`90061` -> `"25:01:01"`). Negative and non-finite input renders as zero.
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{h:02}:{m:02}:{s:02}")
}
