//! FFprobe media information.
//!
//! Probing runs once per reader, before the first decoder session starts.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Container duration in seconds
    pub duration: f64,
    /// Container bitrate in bits/second
    pub bitrate: u64,
    /// First audio stream, if any
    pub audio: Option<AudioStreamInfo>,
    /// First video stream, if any
    pub video: Option<VideoStreamInfo>,
}

/// Audio stream information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    /// Native sample rate in Hz
    pub sample_rate: u32,
    /// Native channel count
    pub channels: u16,
    /// Stream bitrate in bits/second
    pub bitrate: u64,
    /// Audio codec
    pub codec: String,
    /// Stream duration in seconds, when the container reports one
    pub duration: Option<f64>,
}

/// Video stream information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// Stream duration in seconds, when the container reports one
    pub duration: Option<f64>,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u16>,
    bit_rate: Option<String>,
    duration: Option<String>,
}

/// Probe a media file for information.
pub fn probe_media(path: impl AsRef<Path>, ffprobe_binary: &str) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe(ffprobe_binary)?;

    let output = Command::new(ffprobe_binary)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed on {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let info = parse_probe_output(&output.stdout)?;
    debug!(
        path = %path.display(),
        duration = info.duration,
        has_audio = info.audio.is_some(),
        has_video = info.video.is_some(),
        "Probed media"
    );
    Ok(info)
}

/// Parse FFprobe's JSON output.
fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let audio = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .map(|s| AudioStreamInfo {
            sample_rate: parse_number(&s.sample_rate).unwrap_or(0),
            channels: s.channels.unwrap_or(0),
            bitrate: parse_number(&s.bit_rate).unwrap_or(0),
            codec: s.codec_name.clone().unwrap_or_default(),
            duration: parse_number(&s.duration),
        });

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .map(|s| VideoStreamInfo {
            width: s.width.unwrap_or(0),
            height: s.height.unwrap_or(0),
            fps: s
                .avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
                .unwrap_or(0.0),
            codec: s.codec_name.clone().unwrap_or_default(),
            duration: parse_number(&s.duration),
        });

    // Fall back to the stream durations when the container has none
    let duration = parse_number(&probe.format.duration)
        .or_else(|| audio.as_ref().and_then(|a| a.duration))
        .or_else(|| video.as_ref().and_then(|v| v.duration))
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration,
        bitrate: parse_number(&probe.format.bit_rate).unwrap_or(0),
        audio,
        video,
    })
}

fn parse_number<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    value.as_ref().and_then(|v| v.parse::<T>().ok())
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
///
/// FFprobe reports "0/0" for unknown rates; that yields `None`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|fps: &f64| *fps > 0.0)
}
