//! Sliding window over decoded frames.
//!
//! The window holds `capacity` consecutive frames starting at `start_frame`
//! and owns the decoder session that fills it. Moving the window either keeps
//! the overlapping suffix and appends newly decoded frames, or seeks the
//! session and refills from scratch.

use framefeed_models::FrameLayout;
use tracing::{debug, warn};

use crate::codec::FrameCodec;
use crate::diagnostics::ReaderStats;
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::process::DecoderLauncher;
use crate::session::PipeSession;

/// How a recenter was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecenterStrategy {
    /// First fill of an empty window
    Fill,
    /// Kept `conserved` trailing frames and appended the rest
    Conserve { conserved: usize },
    /// Seeked and refilled the whole window
    Refill,
}

impl RecenterStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecenterStrategy::Fill => "fill",
            RecenterStrategy::Conserve { .. } => "conserve",
            RecenterStrategy::Refill => "refill",
        }
    }
}

/// Bounded run of decoded frames with the session that produces them.
pub struct SlidingWindow<C: FrameCodec> {
    codec: C,
    launcher: Box<dyn DecoderLauncher>,
    sample_rate: f64,
    capacity: usize,
    start_frame: u64,
    frames: Vec<C::Frame>,
    session: Option<PipeSession>,
    stats: ReaderStats,
}

impl<C: FrameCodec> SlidingWindow<C> {
    /// Create an empty window. No decoder starts until the first recenter.
    pub fn new(
        codec: C,
        launcher: Box<dyn DecoderLauncher>,
        sample_rate: f64,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            codec,
            launcher,
            sample_rate,
            capacity,
            start_frame: 0,
            frames: Vec::with_capacity(capacity),
            session: None,
            stats: ReaderStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// First frame index held.
    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    /// One past the last frame index held.
    pub fn end_frame(&self) -> u64 {
        self.start_frame + self.frames.len() as u64
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.start_frame && frame < self.end_frame()
    }

    /// Frame at absolute index `frame`, if held.
    pub fn get(&self, frame: u64) -> Option<&C::Frame> {
        if !self.contains(frame) {
            return None;
        }
        self.frames.get((frame - self.start_frame) as usize)
    }

    /// All held frames, `frames()[i]` being frame `start_frame() + i`.
    pub fn frames(&self) -> &[C::Frame] {
        &self.frames
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Read position of the live session, if any.
    pub fn session_position(&self) -> Option<u64> {
        self.session.as_ref().map(PipeSession::position)
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Metric label for this window's frame kind.
    pub fn kind(&self) -> &'static str {
        match self.codec.layout() {
            FrameLayout::Pcm(_) => "audio",
            FrameLayout::Rgb24 { .. } => "video",
        }
    }

    /// Move the window so it surrounds `target`, centered when possible.
    pub fn recenter(&mut self, target: u64) -> MediaResult<RecenterStrategy> {
        let capacity = self.capacity as u64;
        let new_start = target.saturating_sub(capacity / 2);

        let strategy = if self.frames.is_empty() {
            self.seek(new_start)?;
            self.frames = self.read(self.capacity)?;
            RecenterStrategy::Fill
        } else {
            let old_end = self.start_frame + capacity;
            let session_at_end = self.session_position() == Some(old_end);

            if new_start < old_end && old_end < new_start + capacity && session_at_end {
                let conserved = (old_end - new_start) as usize;
                let fresh = self.read(self.capacity - conserved)?;
                let discard = self.frames.len().saturating_sub(conserved);
                self.frames.drain(..discard);
                self.frames.extend(fresh);
                RecenterStrategy::Conserve { conserved }
            } else {
                self.seek(new_start)?;
                self.frames = self.read(self.capacity)?;
                RecenterStrategy::Refill
            }
        };

        self.frames.truncate(self.capacity);
        self.start_frame = new_start;

        self.stats.recenters += 1;
        if let RecenterStrategy::Conserve { .. } = strategy {
            self.stats.conserving_recenters += 1;
        }
        metrics::record_recenter(self.kind(), strategy.as_str());
        debug!(
            target,
            start_frame = new_start,
            strategy = strategy.as_str(),
            "Recentered window"
        );

        Ok(strategy)
    }

    /// Position the session at `frame`.
    ///
    /// Backward moves and jumps of more than one window restart the decoder;
    /// shorter forward moves read and drop the frames in between.
    fn seek(&mut self, frame: u64) -> MediaResult<()> {
        let capacity = self.capacity as u64;
        match self.session.as_mut() {
            Some(session) if frame >= session.position() && frame - session.position() <= capacity => {
                let gap = frame - session.position();
                if gap > 0 {
                    session.skip_frames(gap);
                    self.stats.frames_skipped += gap;
                    metrics::record_frames_skipped(self.kind(), gap);
                    debug!(from = frame - gap, to = frame, "Skipped forward in session");
                }
                Ok(())
            }
            _ => self.restart(frame),
        }
    }

    /// Replace the live session with a new one starting at `frame`.
    fn restart(&mut self, frame: u64) -> MediaResult<()> {
        self.terminate_session();
        let session = PipeSession::start(
            self.launcher.as_ref(),
            frame,
            self.sample_rate,
            self.codec.frame_size_bytes(),
        )?;
        self.session = Some(session);
        self.stats.sessions_started += 1;
        metrics::record_session_start(self.kind());
        Ok(())
    }

    /// Decode the next `n` frames from the live session.
    fn read(&mut self, n: usize) -> MediaResult<Vec<C::Frame>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| MediaError::internal("window has no decoder session"))?;
        let bytes = session.read_frames(n);
        self.stats.frames_decoded += n as u64;
        metrics::record_frames_decoded(self.kind(), n as u64);
        Ok(self.codec.decode(&bytes, n))
    }

    fn terminate_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.terminate() {
                warn!(error = %e, "Failed to terminate decoder session");
            }
        }
    }

    /// Terminate the decoder. Held frames stay readable.
    pub fn close(&mut self) -> MediaResult<()> {
        match self.session.take() {
            Some(mut session) => session.terminate(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PcmCodec;
    use crate::testing::{expected_stereo_frame, MemoryLauncher};
    use framefeed_models::PcmFormat;

    const RATE: f64 = 1000.0;

    fn window(launcher: &MemoryLauncher, capacity: usize) -> SlidingWindow<PcmCodec> {
        SlidingWindow::new(
            PcmCodec::new(PcmFormat::default()),
            Box::new(launcher.clone()),
            RATE,
            capacity,
        )
    }

    fn assert_matches_fresh_decode(window: &SlidingWindow<PcmCodec>, total_frames: u64) {
        for (i, frame) in window.frames().iter().enumerate() {
            let index = window.start_frame() + i as u64;
            let expected = if index < total_frames {
                expected_stereo_frame(index)
            } else {
                vec![0.0, 0.0]
            };
            assert_eq!(frame, &expected, "frame {} diverged", index);
        }
    }

    #[test]
    fn test_first_fill() {
        let launcher = MemoryLauncher::stereo16(RATE, 10_000);
        let mut window = window(&launcher, 100);

        assert_eq!(window.recenter(0).unwrap(), RecenterStrategy::Fill);
        assert_eq!(window.start_frame(), 0);
        assert_eq!(window.len(), 100);
        assert_eq!(window.session_position(), Some(100));
        assert_matches_fresh_decode(&window, 10_000);
    }

    #[test]
    fn test_first_fill_is_centered() {
        let launcher = MemoryLauncher::stereo16(RATE, 10_000);
        let mut window = window(&launcher, 100);

        window.recenter(5000).unwrap();
        assert_eq!(window.start_frame(), 4950);
        assert!(window.contains(5000));
        assert_eq!(launcher.launches(), vec![4950]);
    }

    #[test]
    fn test_overlap_is_conserved() {
        let launcher = MemoryLauncher::stereo16(RATE, 10_000);
        let mut window = window(&launcher, 100);
        window.recenter(0).unwrap();

        let strategy = window.recenter(120).unwrap();
        assert_eq!(strategy, RecenterStrategy::Conserve { conserved: 30 });
        assert_eq!(window.start_frame(), 70);
        assert_eq!(window.len(), 100);
        assert_eq!(window.session_position(), Some(170));

        // No new session, and reuse matches a decode from scratch
        assert_eq!(launcher.launches(), vec![0]);
        assert_matches_fresh_decode(&window, 10_000);
    }

    #[test]
    fn test_small_forward_jump_skips() {
        let launcher = MemoryLauncher::stereo16(RATE, 10_000);
        let mut window = window(&launcher, 100);
        window.recenter(0).unwrap();

        // new_start = 200, session at 100: skip 100 frames
        assert_eq!(window.recenter(250).unwrap(), RecenterStrategy::Refill);
        assert_eq!(window.start_frame(), 200);
        assert_eq!(launcher.launches(), vec![0]);
        assert_eq!(window.stats().frames_skipped, 100);
        assert_matches_fresh_decode(&window, 10_000);
    }

    #[test]
    fn test_large_forward_jump_restarts() {
        let launcher = MemoryLauncher::stereo16(RATE, 10_000);
        let mut window = window(&launcher, 100);
        window.recenter(0).unwrap();

        window.recenter(5000).unwrap();
        assert_eq!(launcher.launches(), vec![0, 4950]);
        assert_eq!(launcher.terminations(), 1);
        assert_eq!(window.stats().frames_skipped, 0);
        assert_matches_fresh_decode(&window, 10_000);
    }

    #[test]
    fn test_backward_jump_restarts() {
        let launcher = MemoryLauncher::stereo16(RATE, 10_000);
        let mut window = window(&launcher, 100);
        window.recenter(1000).unwrap();

        window.recenter(980).unwrap();
        assert_eq!(launcher.launches(), vec![950, 930]);
        assert_eq!(window.start_frame(), 930);
        assert_matches_fresh_decode(&window, 10_000);
    }

    #[test]
    fn test_end_of_stream_is_zero_padded() {
        let launcher = MemoryLauncher::stereo16(RATE, 150);
        let mut window = window(&launcher, 100);
        window.recenter(0).unwrap();

        window.recenter(140).unwrap();
        assert_eq!(window.start_frame(), 90);
        assert_eq!(window.len(), 100);
        assert!(window.frames()[60..].iter().all(|f| f == &vec![0.0, 0.0]));
        assert_matches_fresh_decode(&window, 150);
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let total = 20_000;
        let launcher = MemoryLauncher::stereo16(RATE, total);
        let mut window = window(&launcher, 256);

        // Deterministic mix of sequential steps, drifts and jumps
        let mut seed: u64 = 0x2545_f491;
        let mut target: u64 = 0;
        for _ in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            target = match seed >> 61 {
                0 => (seed >> 20) % (total + 500),
                1 => target.saturating_sub((seed >> 40) % 300),
                _ => target + (seed >> 40) % 200,
            };
            window.recenter(target).unwrap();
            assert!(window.len() <= window.capacity());
            assert!(window.contains(target));
            assert_matches_fresh_decode(&window, total);
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let launcher = MemoryLauncher::stereo16(RATE, 1000);
        let mut window = window(&launcher, 100);
        window.recenter(0).unwrap();

        window.close().unwrap();
        window.close().unwrap();
        assert_eq!(launcher.terminations(), 1);
        assert_eq!(window.session_position(), None);
        assert_eq!(window.len(), 100);
    }
}
