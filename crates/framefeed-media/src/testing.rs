//! In-memory decoder used by unit tests.
//!
//! Frames are a pure function of their index, so any session started at any
//! position produces exactly the bytes a real decoder would for that range.

use std::io::{self, Read};
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::codec::SampleFrame;
use crate::error::{MediaError, MediaResult};
use crate::process::{DecoderLauncher, DecoderProcess};

type FrameFn = dyn Fn(u64) -> Vec<u8> + Send + Sync;

struct MemoryState {
    rate: f64,
    total_frames: u64,
    frame: Box<FrameFn>,
    launches: Mutex<Vec<u64>>,
    terminations: AtomicUsize,
    fail_launches: AtomicBool,
}

#[derive(Clone)]
pub(crate) struct MemoryLauncher {
    state: Arc<MemoryState>,
}

/// Deterministic stereo s16 sample for `frame` and `channel`.
pub(crate) fn stereo_sample(frame: u64, channel: u64) -> i16 {
    ((frame * 31 + channel * 7) % 20_000) as i16 - 10_000
}

/// The normalized frame a [`MemoryLauncher::stereo16`] decoder yields at `frame`.
pub(crate) fn expected_stereo_frame(frame: u64) -> SampleFrame {
    (0..2)
        .map(|ch| f32::from(stereo_sample(frame, ch)) / 32768.0)
        .collect()
}

impl MemoryLauncher {
    fn with_generator(rate: f64, total_frames: u64, frame: Box<FrameFn>) -> Self {
        Self {
            state: Arc::new(MemoryState {
                rate,
                total_frames,
                frame,
                launches: Mutex::new(Vec::new()),
                terminations: AtomicUsize::new(0),
                fail_launches: AtomicBool::new(false),
            }),
        }
    }

    /// Stereo 16-bit PCM at `rate` with `total_frames` frames before EOF.
    pub(crate) fn stereo16(rate: f64, total_frames: u64) -> Self {
        Self::with_generator(
            rate,
            total_frames,
            Box::new(|i| {
                (0..2)
                    .flat_map(|ch| stereo_sample(i, ch).to_le_bytes())
                    .collect()
            }),
        )
    }

    /// RGB24 frames whose every byte is `frame % 251`.
    pub(crate) fn rgb(width: u32, height: u32, rate: f64, total_frames: u64) -> Self {
        let size = width as usize * height as usize * 3;
        Self::with_generator(
            rate,
            total_frames,
            Box::new(move |i| vec![(i % 251) as u8; size]),
        )
    }

    /// Start frames of every session launched so far.
    pub(crate) fn launches(&self) -> Vec<u64> {
        self.state
            .launches
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    pub(crate) fn terminations(&self) -> usize {
        self.state.terminations.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_launches(&self, fail: bool) {
        self.state.fail_launches.store(fail, Ordering::SeqCst);
    }
}

impl DecoderLauncher for MemoryLauncher {
    fn launch(&self, start_seconds: f64) -> MediaResult<Box<dyn DecoderProcess>> {
        if self.state.fail_launches.load(Ordering::SeqCst) {
            return Err(MediaError::ffmpeg_failed("decoder unavailable", None, None));
        }
        let start = (start_seconds * self.state.rate).round() as u64;
        if let Ok(mut launches) = self.state.launches.lock() {
            launches.push(start);
        }
        Ok(Box::new(MemoryProcess {
            state: Arc::clone(&self.state),
            position: start,
            pending: Vec::new(),
            terminated: false,
        }))
    }
}

struct MemoryProcess {
    state: Arc<MemoryState>,
    position: u64,
    pending: Vec<u8>,
    terminated: bool,
}

impl Read for MemoryProcess {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.terminated {
            return Ok(0);
        }
        let mut written = 0;
        while written < buf.len() {
            if self.pending.is_empty() {
                if self.position >= self.state.total_frames {
                    break;
                }
                self.pending = (self.state.frame)(self.position);
                self.position += 1;
            }
            let n = self.pending.len().min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            written += n;
        }
        Ok(written)
    }
}

impl DecoderProcess for MemoryProcess {
    fn terminate(&mut self) -> MediaResult<()> {
        if !self.terminated {
            self.terminated = true;
            self.state.terminations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        !self.terminated
    }
}

impl Drop for MemoryProcess {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

/// Write an executable shell script standing in for the decoder binary.
#[cfg(unix)]
pub(crate) fn fake_decoder(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Script body that logs `bytes` of text to stderr before `frames_bytes` of
/// zeroed frame data on stdout.
#[cfg(unix)]
pub(crate) fn noisy_decoder_body(stderr_bytes: usize, stdout_bytes: usize) -> String {
    format!(
        "yes 'decoder error: corrupt packet' | head -c {} >&2\nhead -c {} /dev/zero",
        stderr_bytes, stdout_bytes
    )
}
