//! Prometheus-style metrics for stream readers.
//!
//! Counters are emitted through the `metrics` facade; they are no-ops until
//! the embedding application installs a recorder.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const DECODER_SESSIONS_TOTAL: &str = "framefeed_decoder_sessions_total";
    pub const WINDOW_RECENTERS_TOTAL: &str = "framefeed_window_recenters_total";
    pub const FRAMES_DECODED_TOTAL: &str = "framefeed_frames_decoded_total";
    pub const FRAMES_SKIPPED_TOTAL: &str = "framefeed_frames_skipped_total";
    pub const WINDOW_CLAMPS_TOTAL: &str = "framefeed_window_clamps_total";
}

/// Record a decoder session start.
pub fn record_session_start(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::DECODER_SESSIONS_TOTAL, &labels).increment(1);
}

/// Record a window recenter and how it was served.
pub fn record_recenter(kind: &str, strategy: &str) {
    let labels = [("kind", kind.to_string()), ("strategy", strategy.to_string())];
    counter!(names::WINDOW_RECENTERS_TOTAL, &labels).increment(1);
}

/// Record frames read from a decoder pipe.
pub fn record_frames_decoded(kind: &str, frames: u64) {
    let labels = [("kind", kind.to_string())];
    counter!(names::FRAMES_DECODED_TOTAL, &labels).increment(frames);
}

/// Record frames read and dropped by a forward skip.
pub fn record_frames_skipped(kind: &str, frames: u64) {
    let labels = [("kind", kind.to_string())];
    counter!(names::FRAMES_SKIPPED_TOTAL, &labels).increment(frames);
}

/// Record a clamped lookup.
pub fn record_clamp(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::WINDOW_CLAMPS_TOTAL, &labels).increment(1);
}
