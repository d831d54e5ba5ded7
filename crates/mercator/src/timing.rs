//! Human readable elapsed times for build and search diagnostics.
use std::time::Duration;

/// Formats an elapsed wall-clock time given in milliseconds.
///
/// Up to one second the raw milliseconds are printed. Past that the value is
/// converted to seconds, and past sixty seconds the seconds are converted to
/// minutes while the remainder is kept as seconds. No rounding is applied at
/// any step:
///
/// ```
/// use mercator::timing::format_elapsed_ms;
///
/// assert_eq!(format_elapsed_ms(500), "500 ms");
/// assert_eq!(format_elapsed_ms(1500), "1.5 seconds");
/// assert_eq!(
///     format_elapsed_ms(65000),
///     "1.0833333333333333 minutes, 5.0 seconds"
/// );
/// ```
pub fn format_elapsed_ms(ms: u64) -> String {
    if ms <= 1000 {
        return format!("{ms} ms");
    }
    let seconds = ms as f64 / 1000.0;
    if seconds <= 60.0 {
        return format!("{} seconds", decimal(seconds));
    }
    let minutes = seconds / 60.0;
    let remainder = seconds % 60.0;
    format!("{} minutes, {} seconds", decimal(minutes), decimal(remainder))
}

/// [`format_elapsed_ms`] for a [`Duration`].
pub fn format_elapsed(elapsed: Duration) -> String {
    format_elapsed_ms(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Shortest round-trip representation that always carries a fractional part.
pub(crate) fn decimal(value: f64) -> String {
    let mut out = value.to_string();
    if value.is_finite() && !out.contains('.') && !out.contains('e') {
        out.push_str(".0");
    }
    out
}
