//! FFmpeg decoder command builder.
//!
//! Decoder commands always write raw, headerless frames to stdout (`-`),
//! read nothing from stdin and report errors on stderr.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{MediaError, MediaResult};

/// Longest output-side seek. Anything before it is skipped with a fast
/// input-side seek, the remainder is decoded precisely.
const MAX_OUTPUT_SEEK_SECS: f64 = 1.0;

/// Builder for FFmpeg commands that decode to a pipe.
#[derive(Debug, Clone)]
pub struct DecoderCommand {
    /// FFmpeg binary name or path
    binary: String,
    /// Input file path
    input: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output-side seek in seconds (first argument after -i)
    output_seek: Option<f64>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Log level
    log_level: String,
}

impl DecoderCommand {
    /// Create a new decoder command.
    pub fn new(binary: impl Into<String>, input: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.into(),
            input: input.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_seek: None,
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Start decoding at `seconds`.
    ///
    /// Splits the seek into a fast input seek landing up to one second early
    /// and an exact output seek covering the rest.
    pub fn seek(mut self, seconds: f64) -> Self {
        if seconds <= 0.0 {
            return self;
        }
        let offset = seconds.min(MAX_OUTPUT_SEEK_SECS);
        self = self
            .input_arg("-ss")
            .input_arg(format!("{:.5}", seconds - offset));
        self.output_seek = Some(offset);
        self
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        // Input args
        args.extend(self.input_args.clone());

        // Input file
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        if let Some(offset) = self.output_seek {
            args.push("-ss".to_string());
            args.push(format!("{:.5}", offset));
        }

        // Log level
        args.push("-loglevel".to_string());
        args.push(self.log_level.clone());

        // Output args
        args.extend(self.output_args.clone());

        // Raw frames to stdout
        args.push("-".to_string());

        args
    }

    /// Build a process command with stdin closed, stdout piped and stderr
    /// discarded. Callers wanting diagnostics redirect stderr themselves.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg(binary: &str) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| MediaError::FfmpegNotFound(binary.to_string()))
}

/// Check if FFprobe is available.
pub fn check_ffprobe(binary: &str) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| MediaError::FfprobeNotFound(binary.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let args = DecoderCommand::new("ffmpeg", "input.mp4")
            .output_args(["-vn", "-f", "s16le"])
            .build_args();

        assert_eq!(
            args,
            vec!["-i", "input.mp4", "-loglevel", "error", "-vn", "-f", "s16le", "-"]
        );
    }

    #[test]
    fn test_seek_splits_into_input_and_output() {
        let args = DecoderCommand::new("ffmpeg", "input.mp4")
            .seek(10.0)
            .output_arg("-vn")
            .build_args();

        assert_eq!(args[0..2], ["-ss", "9.00000"]);
        assert_eq!(args[2..4], ["-i", "input.mp4"]);
        assert_eq!(args[4..6], ["-ss", "1.00000"]);
    }

    #[test]
    fn test_short_seek_is_output_only() {
        let args = DecoderCommand::new("ffmpeg", "input.mp4").seek(0.25).build_args();

        assert_eq!(args[0..2], ["-ss", "0.00000"]);
        assert_eq!(args[4..6], ["-ss", "0.25000"]);
    }

    #[test]
    fn test_zero_seek_adds_nothing() {
        let args = DecoderCommand::new("ffmpeg", "input.mp4").seek(0.0).build_args();
        assert!(!args.contains(&"-ss".to_string()));
    }

    #[test]
    fn test_missing_binary() {
        let err = check_ffmpeg("framefeed-no-such-ffmpeg").unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }
}
