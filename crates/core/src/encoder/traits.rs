//! Trait definitions for the encoder module.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

use super::error::EncoderError;
use super::types::{
    EncodeOutput, EncodeProgress, EncodeRequest, FrameRequest, MediaInfo, SegmentOutput,
    SegmentRequest,
};

/// The capability interface over the external transcoding tool.
///
/// The pipeline talks to the encoder only through these four operations so
/// stage logic can be exercised against a mock without invoking a real
/// encoder.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Returns the name of this encoder implementation.
    fn name(&self) -> &str;

    /// Probes a media file for container duration, codec, and resolution.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, EncoderError>;

    /// Produces one rendition according to the request.
    async fn encode(&self, request: EncodeRequest) -> Result<EncodeOutput, EncoderError>;

    /// Produces one rendition with progress reporting.
    ///
    /// The progress sender receives updates during the encode. If the sender
    /// is dropped, encoding continues without progress reporting.
    async fn encode_with_progress(
        &self,
        request: EncodeRequest,
        progress_tx: mpsc::Sender<EncodeProgress>,
    ) -> Result<EncodeOutput, EncoderError>;

    /// Splits a rendition into fixed-duration segments plus a media playlist.
    async fn segment(&self, request: SegmentRequest) -> Result<SegmentOutput, EncoderError>;

    /// Extracts one still frame at an offset.
    async fn extract_frame(&self, request: FrameRequest) -> Result<(), EncoderError>;

    /// Validates that the encoder is properly configured and ready.
    async fn validate(&self) -> Result<(), EncoderError>;
}
