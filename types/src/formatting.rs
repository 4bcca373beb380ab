//! Centralized time and number formatting utilities.
//!
//! Every duration that reaches a player (chat, action bar, sidebar) goes
//! through this module so splits, deltas and the live timer always agree
//! on the same `HH:MM:SS` shape.

/// Placeholder shown on the sidebar for a milestone with no known time.
pub const UNKNOWN_CLOCK: &str = "--:--:--";

/// Format elapsed milliseconds as a zero-padded `HH:MM:SS` clock.
///
/// Sub-second remainders are truncated and negative input is clamped to
/// zero. Hours are not wrapped, so very long runs show `100:00:00`.
///
/// # Examples
/// ```
/// use splitrun_types::formatting::format_clock;
/// assert_eq!(format_clock(0), "00:00:00");
/// assert_eq!(format_clock(90_500), "00:01:30");
/// assert_eq!(format_clock(3_723_000), "01:02:03");
/// ```
pub fn format_clock(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Format a signed difference against a reference time.
///
/// Positive (slower) and zero differences carry a `+`, faster ones a `-`.
///
/// # Examples
/// ```
/// use splitrun_types::formatting::format_delta;
/// assert_eq!(format_delta(5_000), "+00:00:05");
/// assert_eq!(format_delta(-30_000), "-00:00:30");
/// assert_eq!(format_delta(0), "+00:00:00");
/// ```
pub fn format_delta(diff_ms: i64) -> String {
    let sign = if diff_ms >= 0 { '+' } else { '-' };
    format!("{}{}", sign, format_clock(diff_ms.saturating_abs()))
}

/// Format a damage amount with one decimal place, locale independent.
///
/// # Examples
/// ```
/// use splitrun_types::formatting::format_amount;
/// assert_eq!(format_amount(3.0), "3.0");
/// assert_eq!(format_amount(12.34), "12.3");
/// ```
pub fn format_amount(amount: f32) -> String {
    format!("{:.1}", amount)
}

/// Format a `current/max` health pair.
pub fn format_health(health: f32, max_health: f32) -> String {
    format!("{:.1}/{:.1}", health, max_health)
}

/// Shorten an identifier for display when no player name is known.
///
/// # Examples
/// ```
/// use splitrun_types::formatting::short_id;
/// assert_eq!(short_id("0f8e1c2a-aaaa-bbbb"), "0f8e1c2a");
/// assert_eq!(short_id("abc"), "abc");
/// ```
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Truncate a string to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
