//! Raw frame codecs.
//!
//! A codec turns byte runs read from a decoder pipe into typed frames. Codecs
//! are stateless: the same bytes always decode to the same frames, which is
//! what lets the window reuse overlapping frames without diverging from a
//! fresh decode.

use framefeed_models::{FrameLayout, PcmFormat};

/// One decoded audio frame: one normalized value per channel, in `[-1.0, 1.0)`.
pub type SampleFrame = Vec<f32>;

/// Conversion between raw pipe bytes and frames.
pub trait FrameCodec: Send {
    /// Decoded frame type.
    type Frame: Clone + Send + 'static;

    /// Layout of one frame on the pipe.
    fn layout(&self) -> FrameLayout;

    /// Bytes per frame on the pipe.
    fn frame_size_bytes(&self) -> usize {
        self.layout().frame_size_bytes()
    }

    /// Decode exactly `frame_count` frames.
    ///
    /// When `bytes` holds fewer frames (end of stream), the tail is filled
    /// with [`zero_frame`](Self::zero_frame). A trailing partial frame is
    /// dropped.
    fn decode(&self, bytes: &[u8], frame_count: usize) -> Vec<Self::Frame>;

    /// Silence or black.
    fn zero_frame(&self) -> Self::Frame;

    /// FFmpeg output options producing this codec's raw format at `rate`
    /// frames per second.
    fn output_args(&self, rate: f64) -> Vec<String>;
}

/// Interleaved little-endian signed PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmCodec {
    format: PcmFormat,
}

impl PcmCodec {
    pub fn new(format: PcmFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// `2^(8 * bytes_per_sample - 1)`, the full-scale magnitude.
    fn scale(&self) -> f64 {
        (1u64 << (8 * u32::from(self.format.bytes_per_sample) - 1)) as f64
    }

    fn decode_sample(&self, bytes: &[u8]) -> f32 {
        let raw = match bytes {
            [a] => f64::from(*a as i8),
            [a, b] => f64::from(i16::from_le_bytes([*a, *b])),
            [a, b, c, d] => f64::from(i32::from_le_bytes([*a, *b, *c, *d])),
            _ => 0.0,
        };
        (raw / self.scale()) as f32
    }

    /// Encode frames back to interleaved PCM bytes.
    ///
    /// Values are clamped to the representable range. Frames with the wrong
    /// channel count are truncated or zero-filled to the format's width.
    pub fn encode(&self, frames: &[SampleFrame]) -> Vec<u8> {
        let channels = usize::from(self.format.channels);
        let scale = self.scale();
        let max = scale - 1.0;
        let mut out = Vec::with_capacity(frames.len() * self.format.frame_size_bytes());

        for frame in frames {
            for ch in 0..channels {
                let value = frame.get(ch).copied().unwrap_or(0.0);
                let quantized = (f64::from(value) * scale).round().clamp(-scale, max);
                match self.format.bytes_per_sample {
                    1 => out.push(quantized as i8 as u8),
                    2 => out.extend_from_slice(&(quantized as i16).to_le_bytes()),
                    _ => out.extend_from_slice(&(quantized as i32).to_le_bytes()),
                }
            }
        }
        out
    }
}

impl FrameCodec for PcmCodec {
    type Frame = SampleFrame;

    fn layout(&self) -> FrameLayout {
        FrameLayout::Pcm(self.format)
    }

    fn decode(&self, bytes: &[u8], frame_count: usize) -> Vec<SampleFrame> {
        let width = usize::from(self.format.bytes_per_sample);
        let mut frames: Vec<SampleFrame> = bytes
            .chunks_exact(self.format.frame_size_bytes())
            .take(frame_count)
            .map(|frame| {
                frame
                    .chunks_exact(width)
                    .map(|sample| self.decode_sample(sample))
                    .collect()
            })
            .collect();

        // Pad the read chunk with silence so the result is always full length
        frames.resize_with(frame_count, || self.zero_frame());
        frames
    }

    fn zero_frame(&self) -> SampleFrame {
        vec![0.0; usize::from(self.format.channels)]
    }

    fn output_args(&self, rate: f64) -> Vec<String> {
        vec![
            "-vn".to_string(),
            "-f".to_string(),
            self.format.ffmpeg_format(),
            "-acodec".to_string(),
            self.format.ffmpeg_codec(),
            "-ar".to_string(),
            format!("{}", rate.round() as u64),
            "-ac".to_string(),
            self.format.channels.to_string(),
        ]
    }
}

/// One packed RGB24 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    /// Row-major `width * height * 3` bytes
    pub pixels: Vec<u8>,
}

impl RgbFrame {
    /// Pixel at `(x, y)`, if inside the image and its buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        match self.pixels.get(offset..offset + 3)? {
            &[r, g, b] => Some([r, g, b]),
            _ => None,
        }
    }
}

/// Raw RGB24 video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb24Codec {
    width: u32,
    height: u32,
}

impl Rgb24Codec {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FrameCodec for Rgb24Codec {
    type Frame = RgbFrame;

    fn layout(&self) -> FrameLayout {
        FrameLayout::Rgb24 {
            width: self.width,
            height: self.height,
        }
    }

    fn decode(&self, bytes: &[u8], frame_count: usize) -> Vec<RgbFrame> {
        let mut frames: Vec<RgbFrame> = bytes
            .chunks_exact(self.frame_size_bytes())
            .take(frame_count)
            .map(|pixels| RgbFrame {
                width: self.width,
                height: self.height,
                pixels: pixels.to_vec(),
            })
            .collect();

        frames.resize_with(frame_count, || self.zero_frame());
        frames
    }

    fn zero_frame(&self) -> RgbFrame {
        RgbFrame {
            width: self.width,
            height: self.height,
            pixels: vec![0; self.frame_size_bytes()],
        }
    }

    fn output_args(&self, rate: f64) -> Vec<String> {
        vec![
            "-an".to_string(),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", self.width, self.height),
            "-r".to_string(),
            format!("{:.5}", rate),
        ]
    }
}
