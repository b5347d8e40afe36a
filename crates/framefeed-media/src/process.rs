//! Decoder subprocess handles.
//!
//! A [`DecoderProcess`] is one running decoder whose stdout carries raw
//! frames. Handles are owned resources: dropping one terminates the process
//! and closes its pipes, so no exit path can leak a child.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Stdio};
use tracing::{debug, warn};

use crate::command::{check_ffmpeg, DecoderCommand};
use crate::error::{MediaError, MediaResult};

/// Upper bound on stderr read back from the capture file.
const MAX_STDERR_BYTES: u64 = 64 * 1024;

/// A running decoder whose stdout yields raw frame bytes.
pub trait DecoderProcess: Read + Send {
    /// Stop the decoder and release its pipes.
    ///
    /// Idempotent: calling it on an already terminated handle does nothing.
    fn terminate(&mut self) -> MediaResult<()>;

    /// Whether the process has not exited yet.
    fn is_running(&mut self) -> bool;

    /// Captured diagnostics. Complete only once the process has exited.
    fn stderr_output(&mut self) -> Option<String> {
        None
    }
}

/// Starts decoder processes at a given position.
pub trait DecoderLauncher: Send {
    /// Start a decoder emitting frames from `start_seconds` onwards.
    fn launch(&self, start_seconds: f64) -> MediaResult<Box<dyn DecoderProcess>>;
}

/// An FFmpeg child process decoding to its stdout.
pub struct FfmpegProcess {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr_log: File,
    terminated: bool,
}

impl FfmpegProcess {
    /// Spawn the command with stdin closed, stdout piped and stderr written
    /// to an anonymous temp file, so the decoder never stalls on logging.
    pub fn start(command: &DecoderCommand) -> MediaResult<Self> {
        check_ffmpeg(command.binary())?;

        let args = command.build_args();
        debug!("Running FFmpeg: {} {}", command.binary(), args.join(" "));

        let stderr_log = tempfile::tempfile()?;
        let mut cmd = command.to_command();
        cmd.stderr(Stdio::from(stderr_log.try_clone()?));

        let mut child = cmd.spawn().map_err(|e| {
            MediaError::ffmpeg_failed(
                format!("Failed to spawn {}: {}", command.binary(), e),
                None,
                None,
            )
        })?;

        let stdout = child.stdout.take();
        let mut process = Self {
            child,
            stdout,
            stderr_log,
            terminated: false,
        };

        if process.stdout.is_none() {
            process.terminate()?;
            return Err(MediaError::ffmpeg_failed(
                "Failed to capture FFmpeg stdout",
                None,
                None,
            ));
        }

        Ok(process)
    }

    /// OS process id.
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl Read for FfmpegProcess {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stdout.as_mut() {
            Some(stdout) => stdout.read(buf),
            None => Ok(0),
        }
    }
}

impl DecoderProcess for FfmpegProcess {
    fn terminate(&mut self) -> MediaResult<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        let already_exited = matches!(self.child.try_wait(), Ok(Some(_)));
        if !already_exited {
            if let Err(e) = self.child.kill() {
                // InvalidInput means the process exited between the two calls
                if e.kind() != io::ErrorKind::InvalidInput {
                    warn!(pid = self.child.id(), error = %e, "Failed to kill FFmpeg");
                }
            }
        }

        // Close the pipe before reaping
        self.stdout = None;

        let status = self.child.wait()?;
        debug!(pid = self.child.id(), ?status, already_exited, "FFmpeg terminated");
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        !self.terminated && matches!(self.child.try_wait(), Ok(None))
    }

    fn stderr_output(&mut self) -> Option<String> {
        self.stderr_log.seek(SeekFrom::Start(0)).ok()?;
        let mut captured = Vec::new();
        (&mut self.stderr_log)
            .take(MAX_STDERR_BYTES)
            .read_to_end(&mut captured)
            .ok()?;
        let captured = String::from_utf8_lossy(&captured).trim().to_string();
        (!captured.is_empty()).then_some(captured)
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            warn!(error = %e, "Failed to terminate FFmpeg on drop");
        }
    }
}

/// Launches FFmpeg decoders for one input file and one raw output format.
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    binary: String,
    input: PathBuf,
    output_args: Vec<String>,
}

impl FfmpegLauncher {
    pub fn new(binary: impl Into<String>, input: impl AsRef<Path>, output_args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            input: input.as_ref().to_path_buf(),
            output_args,
        }
    }

    /// The command a session starting at `start_seconds` runs.
    pub fn command(&self, start_seconds: f64) -> DecoderCommand {
        DecoderCommand::new(self.binary.clone(), &self.input)
            .seek(start_seconds)
            .output_args(self.output_args.iter().cloned())
    }
}

impl DecoderLauncher for FfmpegLauncher {
    fn launch(&self, start_seconds: f64) -> MediaResult<Box<dyn DecoderProcess>> {
        let process = FfmpegProcess::start(&self.command(start_seconds))?;
        Ok(Box::new(process))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launcher_command() {
        let launcher = FfmpegLauncher::new(
            "ffmpeg",
            "song.flac",
            vec!["-vn".to_string(), "-f".to_string(), "s16le".to_string()],
        );

        let args = launcher.command(2.5).build_args();
        assert_eq!(
            args,
            vec![
                "-ss", "1.50000", "-i", "song.flac", "-ss", "1.00000", "-loglevel", "error",
                "-vn", "-f", "s16le", "-"
            ]
        );
    }

    #[test]
    fn test_launch_with_missing_binary_fails() {
        let launcher = FfmpegLauncher::new("framefeed-no-such-ffmpeg", "song.flac", Vec::new());
        let err = launcher.launch(0.0).err().unwrap();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_noisy_decoder_does_not_stall() {
        use crate::testing::{fake_decoder, noisy_decoder_body};
        use std::sync::mpsc;
        use std::time::Duration;

        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_decoder(dir.path(), "noisy-ffmpeg", &noisy_decoder_body(256 * 1024, 400_000));
        let launcher = FfmpegLauncher::new(binary.to_string_lossy(), "song.flac", Vec::new());

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut process = launcher.launch(0.0).unwrap();
            let mut frames = Vec::new();
            process.read_to_end(&mut frames).unwrap();
            process.terminate().unwrap();
            let _ = tx.send((frames.len(), process.stderr_output()));
        });

        let (read, stderr) = rx
            .recv_timeout(Duration::from_secs(30))
            .expect("decoder stalled on stderr");
        assert_eq!(read, 400_000);
        let stderr = stderr.unwrap();
        assert!(stderr.starts_with("decoder error: corrupt packet"));
        assert!(stderr.len() as u64 <= MAX_STDERR_BYTES);
    }

    #[cfg(unix)]
    #[test]
    fn test_stderr_readable_while_running() {
        use crate::testing::fake_decoder;

        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_decoder(dir.path(), "quiet-ffmpeg", "sleep 30");
        let launcher = FfmpegLauncher::new(binary.to_string_lossy(), "song.flac", Vec::new());

        let mut process = launcher.launch(0.0).unwrap();
        assert!(process.is_running());
        assert_eq!(process.stderr_output(), None);
        process.terminate().unwrap();
        assert!(!process.is_running());
    }
}
