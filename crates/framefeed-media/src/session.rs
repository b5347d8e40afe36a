//! Pipe sessions.
//!
//! A session is one live decoder run started at a known frame. Its read
//! position only moves forward; going anywhere else means starting a new
//! session.

use std::io::{ErrorKind, Read};
use tracing::{debug, warn};

use crate::error::MediaResult;
use crate::process::{DecoderLauncher, DecoderProcess};

/// Scratch size used when discarding skipped frames.
const SKIP_CHUNK_BYTES: usize = 64 * 1024;

/// One live decoder run and its read position.
pub struct PipeSession {
    process: Box<dyn DecoderProcess>,
    frame_size: usize,
    start_frame: u64,
    position: u64,
    exhausted: bool,
    diagnostics: Option<String>,
}

impl PipeSession {
    /// Launch a decoder positioned at `start_frame`.
    pub fn start(
        launcher: &dyn DecoderLauncher,
        start_frame: u64,
        sample_rate: f64,
        frame_size: usize,
    ) -> MediaResult<Self> {
        let start_seconds = start_frame as f64 / sample_rate;
        let process = launcher.launch(start_seconds)?;
        debug!(start_frame, start_seconds, "Started decoder session");
        Ok(Self {
            process,
            frame_size,
            start_frame,
            position: start_frame,
            exhausted: false,
            diagnostics: None,
        })
    }

    /// Frame index the next read returns.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    /// Whether the decoder has reached end of stream.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Decoder stderr captured at end of stream or on termination.
    pub fn diagnostics(&self) -> Option<&str> {
        self.diagnostics.as_deref()
    }

    /// Read the raw bytes of the next `n_frames` frames.
    ///
    /// Blocks until all bytes arrived or the stream ended. The position
    /// advances by `n_frames` either way; frames missing at the end of the
    /// stream are the codec's to pad.
    pub fn read_frames(&mut self, n_frames: usize) -> Vec<u8> {
        let wanted = n_frames * self.frame_size;
        let mut bytes = vec![0u8; wanted];
        let filled = self.fill(&mut bytes);
        bytes.truncate(filled);

        if filled < wanted {
            debug!(
                position = self.position,
                requested = n_frames,
                received = filled / self.frame_size.max(1),
                "Short read from decoder"
            );
            self.capture_diagnostics();
        }

        self.position += n_frames as u64;
        bytes
    }

    /// Read and drop the next `n_frames` frames.
    pub fn skip_frames(&mut self, n_frames: u64) {
        let mut remaining = n_frames as usize * self.frame_size;
        let mut scratch = vec![0u8; SKIP_CHUNK_BYTES.min(remaining.max(1))];

        while remaining > 0 && !self.exhausted {
            let len = scratch.len().min(remaining);
            let filled = self.fill(&mut scratch[..len]);
            remaining -= filled;
            if filled < len {
                break;
            }
        }

        self.position += n_frames;
    }

    /// Fill `buf` from the pipe until it is full or the stream ends.
    fn fill(&mut self, buf: &mut [u8]) -> usize {
        let mut filled = 0;
        while filled < buf.len() && !self.exhausted {
            match self.process.read(&mut buf[filled..]) {
                Ok(0) => self.exhausted = true,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // The rest of the request is padded like an end of stream
                    warn!(position = self.position, error = %e, "Decoder pipe read failed");
                    self.exhausted = true;
                }
            }
        }
        filled
    }

    /// Terminate the decoder process and collect what it logged.
    pub fn terminate(&mut self) -> MediaResult<()> {
        self.process.terminate()?;
        self.capture_diagnostics();
        Ok(())
    }

    fn capture_diagnostics(&mut self) {
        if let Some(stderr) = self.process.stderr_output() {
            if self.diagnostics.as_deref() != Some(stderr.as_str()) {
                debug!(position = self.position, stderr = %stderr, "Decoder diagnostics");
            }
            self.diagnostics = Some(stderr);
        }
    }
}
