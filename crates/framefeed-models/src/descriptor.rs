//! Stream descriptor models.
//!
//! A [`StreamDescriptor`] is built once per reader from probed metadata and
//! never changes afterwards. It answers the timing questions the reader asks
//! on every lookup (time to frame index, stream bounds) and knows the byte
//! layout of one decoded frame.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Sample widths FFmpeg can emit as signed little-endian PCM.
pub const SUPPORTED_SAMPLE_WIDTHS: &[u8] = &[1, 2, 4];

/// Largest channel count accepted for PCM output.
pub const MAX_CHANNELS: u16 = 8;

/// Interleaved signed PCM sample format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PcmFormat {
    /// Number of interleaved channels
    pub channels: u16,
    /// Width of one sample in bytes (1, 2 or 4)
    pub bytes_per_sample: u8,
}

impl PcmFormat {
    /// Create and validate a PCM format.
    pub fn new(channels: u16, bytes_per_sample: u8) -> Result<Self, ConfigError> {
        let format = Self {
            channels,
            bytes_per_sample,
        };
        format.validate()?;
        Ok(format)
    }

    /// Check channel count and sample width.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_SAMPLE_WIDTHS.contains(&self.bytes_per_sample) {
            return Err(ConfigError::UnsupportedSampleWidth(self.bytes_per_sample));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(ConfigError::UnsupportedChannelCount(self.channels));
        }
        Ok(())
    }

    /// FFmpeg muxer name for this format (e.g. `s16le`).
    pub fn ffmpeg_format(&self) -> String {
        match self.bytes_per_sample {
            // 8-bit PCM has no endianness suffix
            1 => "s8".to_string(),
            n => format!("s{}le", 8 * u32::from(n)),
        }
    }

    /// FFmpeg codec name for this format (e.g. `pcm_s16le`).
    pub fn ffmpeg_codec(&self) -> String {
        format!("pcm_{}", self.ffmpeg_format())
    }

    /// Size in bytes of one interleaved frame.
    pub fn frame_size_bytes(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bytes_per_sample)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            channels: 2,
            bytes_per_sample: 2,
        }
    }
}

/// Byte layout of a single decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameLayout {
    /// One multi-channel audio sample
    Pcm(PcmFormat),
    /// One packed 8-bit RGB image
    Rgb24 { width: u32, height: u32 },
}

impl FrameLayout {
    /// Values per frame: audio channels, or 3 for RGB.
    pub fn channel_count(&self) -> usize {
        match self {
            FrameLayout::Pcm(pcm) => usize::from(pcm.channels),
            FrameLayout::Rgb24 { .. } => 3,
        }
    }

    /// Bytes per individual value.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            FrameLayout::Pcm(pcm) => usize::from(pcm.bytes_per_sample),
            FrameLayout::Rgb24 { .. } => 1,
        }
    }

    /// Size in bytes of one frame on the decoder pipe.
    pub fn frame_size_bytes(&self) -> usize {
        match self {
            FrameLayout::Pcm(pcm) => pcm.frame_size_bytes(),
            FrameLayout::Rgb24 { width, height } => *width as usize * *height as usize * 3,
        }
    }

    /// Validate the layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            FrameLayout::Pcm(pcm) => pcm.validate(),
            FrameLayout::Rgb24 { width, height } => {
                if *width == 0 || *height == 0 {
                    return Err(ConfigError::InvalidFrameSize {
                        width: *width,
                        height: *height,
                    });
                }
                Ok(())
            }
        }
    }
}

/// Immutable metadata for one decodable stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StreamDescriptor {
    sample_rate: f64,
    duration: f64,
    layout: FrameLayout,
}

impl StreamDescriptor {
    /// Create a descriptor.
    ///
    /// `sample_rate` is in frames per second (audio samples or video frames),
    /// `duration` in seconds.
    pub fn new(sample_rate: f64, duration: f64, layout: FrameLayout) -> Result<Self, ConfigError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(ConfigError::InvalidDuration(duration));
        }
        layout.validate()?;
        Ok(Self {
            sample_rate,
            duration,
            layout,
        })
    }

    /// Frames per second.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn channel_count(&self) -> usize {
        self.layout.channel_count()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.layout.bytes_per_sample()
    }

    pub fn frame_size_bytes(&self) -> usize {
        self.layout.frame_size_bytes()
    }

    /// Number of frames in the stream, `round(sample_rate * duration)`.
    pub fn total_frame_count(&self) -> u64 {
        (self.sample_rate * self.duration).round() as u64
    }

    /// Whether `t` lies in `[0, duration)`.
    pub fn contains_time(&self, t: f64) -> bool {
        t.is_finite() && t >= 0.0 && t < self.duration
    }

    /// 0-based frame index for a timestamp, `round(sample_rate * t)`.
    ///
    /// Only meaningful for timestamps accepted by [`contains_time`](Self::contains_time).
    pub fn frame_index(&self, t: f64) -> u64 {
        (self.sample_rate * t).round().max(0.0) as u64
    }

    /// Timestamp of the first sample of `frame`.
    pub fn frame_time(&self, frame: u64) -> f64 {
        frame as f64 / self.sample_rate
    }
}
