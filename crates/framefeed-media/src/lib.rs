#![deny(unreachable_patterns)]
//! Windowed random access over FFmpeg decoder pipes.
//!
//! This crate provides:
//! - Type-safe FFmpeg decoder command building and FFprobe probing
//! - Owned decoder process handles that never leak a child process
//! - Raw frame codecs for PCM audio and RGB24 video
//! - A sliding window that reuses overlapping frames and picks the cheaper
//!   of skipping forward or restarting the decoder
//! - Time-indexed readers with zero-padding at stream edges and observable
//!   recovery when a lookup misses the window
//!
//! ```no_run
//! use framefeed_media::AudioReader;
//! use framefeed_models::ReaderConfig;
//!
//! let mut reader = AudioReader::open_audio("song.flac", &ReaderConfig::default())?;
//! let frame = reader.get_frame(12.5)?;
//! let block = reader.get_frames(&[12.5, 12.6, 12.7])?;
//! reader.close()?;
//! # Ok::<(), framefeed_media::MediaError>(())
//! ```

pub mod codec;
pub mod command;
pub mod diagnostics;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod process;
pub mod reader;
pub mod session;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::{FrameCodec, PcmCodec, Rgb24Codec, RgbFrame, SampleFrame};
pub use command::{check_ffmpeg, check_ffprobe, DecoderCommand};
pub use diagnostics::{ClampEvent, DiagnosticHandler, ReaderStats};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_media, AudioStreamInfo, MediaInfo, VideoStreamInfo};
pub use process::{DecoderLauncher, DecoderProcess, FfmpegLauncher, FfmpegProcess};
pub use reader::{AudioReader, ReaderState, StreamReader, VideoReader};
pub use session::PipeSession;
pub use window::{RecenterStrategy, SlidingWindow};
