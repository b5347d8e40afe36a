//! Observable reader statistics and recoverable diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters describing how a reader has served its lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderStats {
    /// Decoder processes started, including the initial one
    pub sessions_started: u64,
    /// Window recenters of any kind
    pub recenters: u64,
    /// Recenters served by keeping an overlapping suffix
    pub conserving_recenters: u64,
    /// Frames read from the decoder into the window
    pub frames_decoded: u64,
    /// Frames read and dropped by forward skips
    pub frames_skipped: u64,
    /// Lookups answered from a clamped window slot
    pub clamp_events: u64,
}

/// A lookup that fell outside the window right after recentering.
///
/// The reader answers it from the nearest valid slot instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampEvent {
    /// Source file of the reader
    pub source: String,
    /// First and last requested in-range timestamps
    pub requested_times: (f64, f64),
    /// Lowest and highest requested frame indices
    pub requested_frames: (u64, u64),
    /// Window bounds as `[start, end)` frame indices
    pub window: (u64, u64),
    /// Number of lookups that were clamped
    pub clamped: usize,
}

impl fmt::Display for ClampEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: at t={:.2}-{:.2}s wanted frames {}-{} but window holds {}-{} ({} lookups clamped)",
            self.source,
            self.requested_times.0,
            self.requested_times.1,
            self.requested_frames.0,
            self.requested_frames.1,
            self.window.0,
            self.window.1,
            self.clamped
        )
    }
}

/// Callback invoked for every clamp event.
pub type DiagnosticHandler = Box<dyn FnMut(&ClampEvent) + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_event_display() {
        let event = ClampEvent {
            source: "song.wav".to_string(),
            requested_times: (0.5, 1.5),
            requested_frames: (22050, 66150),
            window: (20002, 24098),
            clamped: 2,
        };
        assert_eq!(
            event.to_string(),
            "song.wav: at t=0.50-1.50s wanted frames 22050-66150 but window holds 20002-24098 (2 lookups clamped)"
        );
    }
}
