//! Reader configuration.
//!
//! The defaults match what most callers want for audio: 44.1 kHz stereo
//! 16-bit PCM, with a window large enough that playback-style sequential
//! access almost never restarts the decoder.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::PcmFormat;

/// Default number of audio frames held in a reader window.
pub const DEFAULT_BUFFER_SIZE: usize = 200_000;
/// Default number of video frames held in a reader window.
pub const DEFAULT_VIDEO_BUFFER_SIZE: usize = 24;
/// Default decoded audio sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
/// Default FFmpeg binary name.
pub const DEFAULT_FFMPEG_BINARY: &str = "ffmpeg";
/// Default FFprobe binary name.
pub const DEFAULT_FFPROBE_BINARY: &str = "ffprobe";

/// Configuration errors. Always fatal, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unsupported sample width: {0} bytes (expected 1, 2 or 4)")]
    UnsupportedSampleWidth(u8),

    #[error("unsupported channel count: {0}")]
    UnsupportedChannelCount(u16),

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("invalid duration: {0}")]
    InvalidDuration(f64),

    #[error("invalid frame size: {width}x{height}")]
    InvalidFrameSize { width: u32, height: u32 },

    #[error("buffer size must be at least one frame")]
    EmptyBuffer,

    #[error("empty binary path for {0}")]
    EmptyBinary(&'static str),
}

/// Configuration shared by audio and video readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReaderConfig {
    /// Audio window capacity in frames
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Video window capacity in frames
    #[serde(default = "default_video_buffer_size")]
    pub video_buffer_size: usize,

    /// Sample rate requested from the decoder for audio
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Channel count requested from the decoder for audio
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Sample width in bytes requested from the decoder for audio
    #[serde(default = "default_bytes_per_sample")]
    pub bytes_per_sample: u8,

    /// Video frame rate override; the probed rate is used when unset
    #[serde(default)]
    pub video_fps: Option<f64>,

    /// FFmpeg binary name or path
    #[serde(default = "default_ffmpeg_binary")]
    pub ffmpeg_binary: String,

    /// FFprobe binary name or path
    #[serde(default = "default_ffprobe_binary")]
    pub ffprobe_binary: String,
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}
fn default_video_buffer_size() -> usize {
    DEFAULT_VIDEO_BUFFER_SIZE
}
fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}
fn default_channels() -> u16 {
    2
}
fn default_bytes_per_sample() -> u8 {
    2
}
fn default_ffmpeg_binary() -> String {
    DEFAULT_FFMPEG_BINARY.to_string()
}
fn default_ffprobe_binary() -> String {
    DEFAULT_FFPROBE_BINARY.to_string()
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            video_buffer_size: DEFAULT_VIDEO_BUFFER_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: default_channels(),
            bytes_per_sample: default_bytes_per_sample(),
            video_fps: None,
            ffmpeg_binary: DEFAULT_FFMPEG_BINARY.to_string(),
            ffprobe_binary: DEFAULT_FFPROBE_BINARY.to_string(),
        }
    }
}

impl ReaderConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            buffer_size: env_parse("FRAMEFEED_BUFFER_SIZE").unwrap_or(defaults.buffer_size),
            video_buffer_size: env_parse("FRAMEFEED_VIDEO_BUFFER_SIZE")
                .unwrap_or(defaults.video_buffer_size),
            sample_rate: env_parse("FRAMEFEED_SAMPLE_RATE").unwrap_or(defaults.sample_rate),
            channels: env_parse("FRAMEFEED_CHANNELS").unwrap_or(defaults.channels),
            bytes_per_sample: env_parse("FRAMEFEED_BYTES_PER_SAMPLE")
                .unwrap_or(defaults.bytes_per_sample),
            video_fps: env_parse("FRAMEFEED_VIDEO_FPS"),
            ffmpeg_binary: std::env::var("FFMPEG_BINARY").unwrap_or(defaults.ffmpeg_binary),
            ffprobe_binary: std::env::var("FFPROBE_BINARY").unwrap_or(defaults.ffprobe_binary),
        }
    }

    /// Builder-style setter for the audio window capacity.
    pub fn with_buffer_size(mut self, frames: usize) -> Self {
        self.buffer_size = frames;
        self
    }

    /// Builder-style setter for the video window capacity.
    pub fn with_video_buffer_size(mut self, frames: usize) -> Self {
        self.video_buffer_size = frames;
        self
    }

    /// Builder-style setter for the decoded audio format.
    pub fn with_pcm(mut self, sample_rate: u32, channels: u16, bytes_per_sample: u8) -> Self {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.bytes_per_sample = bytes_per_sample;
        self
    }

    /// Builder-style setter for the video frame rate.
    pub fn with_video_fps(mut self, fps: f64) -> Self {
        self.video_fps = Some(fps);
        self
    }

    /// Builder-style setter for the FFmpeg binary.
    pub fn with_ffmpeg_binary(mut self, binary: impl Into<String>) -> Self {
        self.ffmpeg_binary = binary.into();
        self
    }

    /// Builder-style setter for the FFprobe binary.
    pub fn with_ffprobe_binary(mut self, binary: impl Into<String>) -> Self {
        self.ffprobe_binary = binary.into();
        self
    }

    /// Audio sample format requested from the decoder.
    pub fn pcm_format(&self) -> Result<PcmFormat, ConfigError> {
        PcmFormat::new(self.channels, self.bytes_per_sample)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pcm_format()?;
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate(0.0));
        }
        if let Some(fps) = self.video_fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(ConfigError::InvalidSampleRate(fps));
            }
        }
        if self.buffer_size == 0 || self.video_buffer_size == 0 {
            return Err(ConfigError::EmptyBuffer);
        }
        if self.ffmpeg_binary.trim().is_empty() {
            return Err(ConfigError::EmptyBinary("ffmpeg"));
        }
        if self.ffprobe_binary.trim().is_empty() {
            return Err(ConfigError::EmptyBinary("ffprobe"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
