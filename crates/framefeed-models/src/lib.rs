//! Shared data models for framefeed stream readers.
//!
//! This crate provides Serde-serializable types for:
//! - Stream descriptors produced once by probing a media file
//! - Raw frame layouts (interleaved PCM, packed RGB24)
//! - Reader configuration and its validation

pub mod config;
pub mod descriptor;

// Re-export common types
pub use config::{ConfigError, ReaderConfig};
pub use descriptor::{FrameLayout, PcmFormat, StreamDescriptor};
