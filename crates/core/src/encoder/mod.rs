//! Media probing and encoding.
//!
//! The [`Encoder`] trait covers the four capabilities the pipeline needs:
//! probe, encode, segment, and frame extraction. [`FfmpegEncoder`] is the
//! production implementation backed by the ffmpeg and ffprobe binaries.

mod config;
mod error;
mod ffmpeg;
pub mod presets;
mod traits;
mod types;

pub use config::EncoderConfig;
pub use error::EncoderError;
pub use ffmpeg::FfmpegEncoder;
pub use presets::{applicable_targets, ladder, ladder_from_names, QualityPreset};
pub use traits::Encoder;
pub use types::{
    EncodeOutput, EncodeProgress, EncodeRequest, EncodeTarget, FrameRequest, MediaInfo,
    SegmentOutput, SegmentRequest,
};
