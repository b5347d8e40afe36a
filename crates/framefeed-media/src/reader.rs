//! Random-access stream readers.
//!
//! A [`StreamReader`] maps timestamps to frame indices and serves them from a
//! [`SlidingWindow`]. Lookups outside the stream return zero frames; lookups
//! that still miss the window after a recenter are clamped to the nearest
//! held frame and reported as a [`ClampEvent`].
//!
//! Readers are blocking and single-owner: every lookup takes `&mut self` and
//! may wait on the decoder pipe. Use one reader per thread for parallel access.

use std::path::Path;
use tracing::{debug, warn};

use framefeed_models::{ConfigError, FrameLayout, ReaderConfig, StreamDescriptor};

use crate::codec::{FrameCodec, PcmCodec, Rgb24Codec};
use crate::command::check_ffmpeg;
use crate::diagnostics::{ClampEvent, DiagnosticHandler, ReaderStats};
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::probe::probe_media;
use crate::process::{DecoderLauncher, FfmpegLauncher};
use crate::window::SlidingWindow;

/// Reader of normalized PCM audio frames.
pub type AudioReader = StreamReader<PcmCodec>;

/// Reader of RGB24 video frames.
pub type VideoReader = StreamReader<Rgb24Codec>;

/// Externally visible reader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Probed, first window filled, serving lookups
    Ready,
    /// Decoder terminated; every lookup fails
    Closed,
}

/// Time-indexed random access over a decoder subprocess.
pub struct StreamReader<C: FrameCodec> {
    source: String,
    descriptor: StreamDescriptor,
    window: SlidingWindow<C>,
    state: ReaderState,
    clamp_events: u64,
    last_clamp: Option<ClampEvent>,
    diagnostic_handler: Option<DiagnosticHandler>,
}

impl<C: FrameCodec> StreamReader<C> {
    /// Build a reader over any decoder launcher.
    ///
    /// The window holds `min(total_frames + 1, buffer_size)` frames and is
    /// filled around frame 0 before this returns.
    pub fn with_launcher(
        source: impl Into<String>,
        descriptor: StreamDescriptor,
        codec: C,
        launcher: Box<dyn DecoderLauncher>,
        buffer_size: usize,
    ) -> MediaResult<Self> {
        let source = source.into();

        if buffer_size == 0 {
            return Err(ConfigError::EmptyBuffer.into());
        }
        if codec.layout() != descriptor.layout() {
            return Err(MediaError::internal(format!(
                "codec layout {:?} does not match stream layout {:?}",
                codec.layout(),
                descriptor.layout()
            )));
        }

        let total_frames = descriptor.total_frame_count();
        let capacity = usize::try_from(total_frames.saturating_add(1))
            .unwrap_or(usize::MAX)
            .min(buffer_size);

        let mut window = SlidingWindow::new(codec, launcher, descriptor.sample_rate(), capacity);
        window.recenter(0)?;

        debug!(
            source = %source,
            duration = descriptor.duration(),
            sample_rate = descriptor.sample_rate(),
            total_frames,
            capacity,
            "Opened stream reader"
        );

        Ok(Self {
            source,
            descriptor,
            window,
            state: ReaderState::Ready,
            clamp_events: 0,
            last_clamp: None,
            diagnostic_handler: None,
        })
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    /// File identity used in errors and diagnostics.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ReaderState::Closed
    }

    /// Window capacity in frames.
    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    /// Current window bounds as `[start, end)` frame indices.
    pub fn window_bounds(&self) -> (u64, u64) {
        (self.window.start_frame(), self.window.end_frame())
    }

    pub fn stats(&self) -> ReaderStats {
        ReaderStats {
            clamp_events: self.clamp_events,
            ..self.window.stats()
        }
    }

    /// Most recent clamp event, if any lookup was clamped.
    pub fn last_clamp(&self) -> Option<&ClampEvent> {
        self.last_clamp.as_ref()
    }

    /// Install a callback invoked for every clamp event.
    pub fn set_diagnostic_handler(&mut self, handler: DiagnosticHandler) {
        self.diagnostic_handler = Some(handler);
    }

    /// Frame at time `t` in seconds.
    ///
    /// Times outside `[0, duration)` yield a zero frame.
    pub fn get_frame(&mut self, t: f64) -> MediaResult<C::Frame> {
        self.ensure_open()?;

        if !self.descriptor.contains_time(t) {
            return Ok(self.window.codec().zero_frame());
        }

        let index = self.descriptor.frame_index(t);
        self.ensure_window(index, index)?;

        let (slot, clamped) = self.slot_for(index);
        if clamped {
            self.report_clamp((t, t), (index, index), 1);
        }
        Ok(self.window.frames()[slot].clone())
    }

    /// Frames at each time in `times`, one output per input.
    ///
    /// Out-of-range times yield zero frames and do not move the window. The
    /// window is recentered at most once per call.
    pub fn get_frames(&mut self, times: &[f64]) -> MediaResult<Vec<C::Frame>> {
        self.ensure_open()?;

        let zero = self.window.codec().zero_frame();
        let mut frames = vec![zero; times.len()];

        let requested: Vec<(usize, f64, u64)> = times
            .iter()
            .enumerate()
            .filter(|(_, t)| self.descriptor.contains_time(**t))
            .map(|(slot, t)| (slot, *t, self.descriptor.frame_index(*t)))
            .collect();

        let (Some(min_index), Some(max_index)) = (
            requested.iter().map(|r| r.2).min(),
            requested.iter().map(|r| r.2).max(),
        ) else {
            return Ok(frames);
        };

        self.ensure_window(min_index, max_index)?;

        let mut clamped = 0;
        for &(out, _, index) in &requested {
            let (slot, was_clamped) = self.slot_for(index);
            if was_clamped {
                clamped += 1;
            }
            frames[out] = self.window.frames()[slot].clone();
        }

        if clamped > 0 {
            let min_time = requested.iter().map(|r| r.1).fold(f64::INFINITY, f64::min);
            let max_time = requested.iter().map(|r| r.1).fold(f64::NEG_INFINITY, f64::max);
            self.report_clamp((min_time, max_time), (min_index, max_index), clamped);
        }

        Ok(frames)
    }

    /// Terminate the decoder. Safe to call repeatedly.
    pub fn close(&mut self) -> MediaResult<()> {
        if self.state == ReaderState::Closed {
            return Ok(());
        }
        self.state = ReaderState::Closed;
        debug!(source = %self.source, "Closing stream reader");
        self.window.close()
    }

    fn ensure_open(&self) -> MediaResult<()> {
        match self.state {
            ReaderState::Ready => Ok(()),
            ReaderState::Closed => Err(MediaError::ReaderClosed(self.source.clone())),
        }
    }

    /// Recenter once if either end of `[min, max]` is outside the window.
    fn ensure_window(&mut self, min: u64, max: u64) -> MediaResult<()> {
        if !self.window.contains(min) {
            self.window.recenter(min)?;
        } else if !self.window.contains(max) {
            self.window.recenter(max)?;
        }
        Ok(())
    }

    /// Window slot for `index`, clamped into the window. The flag is set
    /// when clamping was needed.
    fn slot_for(&self, index: u64) -> (usize, bool) {
        let start = self.window.start_frame();
        let last = self.window.len().saturating_sub(1);
        if index < start {
            return (0, true);
        }
        let offset = index - start;
        if offset > last as u64 {
            (last, true)
        } else {
            (offset as usize, false)
        }
    }

    fn report_clamp(&mut self, times: (f64, f64), frames: (u64, u64), clamped: usize) {
        let event = ClampEvent {
            source: self.source.clone(),
            requested_times: times,
            requested_frames: frames,
            window: (self.window.start_frame(), self.window.end_frame()),
            clamped,
        };

        warn!(
            source = %event.source,
            requested_start = event.requested_frames.0,
            requested_end = event.requested_frames.1,
            window_start = event.window.0,
            window_end = event.window.1,
            clamped,
            "Lookup outside window after recenter, repeating nearest frame"
        );
        metrics::record_clamp(self.window.kind());

        self.clamp_events += 1;
        if let Some(handler) = self.diagnostic_handler.as_mut() {
            handler(&event);
        }
        self.last_clamp = Some(event);
    }
}

impl<C: FrameCodec> Drop for StreamReader<C> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(source = %self.source, error = %e, "Failed to close stream reader");
        }
    }
}

impl AudioReader {
    /// Open the first audio stream of `path` with FFmpeg.
    ///
    /// Audio is decoded to the sample rate, channel count and sample width
    /// in `config`.
    pub fn open_audio(path: impl AsRef<Path>, config: &ReaderConfig) -> MediaResult<Self> {
        let path = path.as_ref();
        config.validate()?;
        check_ffmpeg(&config.ffmpeg_binary)?;

        let info = probe_media(path, &config.ffprobe_binary)?;
        if info.audio.is_none() {
            return Err(MediaError::invalid_media(path, "no audio stream found"));
        }

        let format = config.pcm_format()?;
        let descriptor = StreamDescriptor::new(
            f64::from(config.sample_rate),
            info.duration,
            FrameLayout::Pcm(format),
        )?;
        let codec = PcmCodec::new(format);
        let launcher = FfmpegLauncher::new(
            config.ffmpeg_binary.clone(),
            path,
            codec.output_args(descriptor.sample_rate()),
        );

        Self::with_launcher(
            path.display().to_string(),
            descriptor,
            codec,
            Box::new(launcher),
            config.buffer_size,
        )
    }
}

impl VideoReader {
    /// Open the first video stream of `path` with FFmpeg.
    ///
    /// Frames come out at the probed size and at `config.video_fps`, or the
    /// probed frame rate when unset.
    pub fn open_video(path: impl AsRef<Path>, config: &ReaderConfig) -> MediaResult<Self> {
        let path = path.as_ref();
        config.validate()?;
        check_ffmpeg(&config.ffmpeg_binary)?;

        let info = probe_media(path, &config.ffprobe_binary)?;
        let video = info
            .video
            .as_ref()
            .ok_or_else(|| MediaError::invalid_media(path, "no video stream found"))?;

        let fps = config.video_fps.unwrap_or(video.fps);
        if fps <= 0.0 {
            return Err(MediaError::invalid_media(path, "unknown frame rate"));
        }

        let descriptor = StreamDescriptor::new(
            fps,
            info.duration,
            FrameLayout::Rgb24 {
                width: video.width,
                height: video.height,
            },
        )?;
        let codec = Rgb24Codec::new(video.width, video.height);
        let launcher = FfmpegLauncher::new(
            config.ffmpeg_binary.clone(),
            path,
            codec.output_args(fps),
        );

        Self::with_launcher(
            path.display().to_string(),
            descriptor,
            codec,
            Box::new(launcher),
            config.video_buffer_size,
        )
    }
}
