//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the external capability
//! traits (encoder, blob store, permission oracle, clock), allowing
//! comprehensive E2E testing without ffmpeg, real storage, or the
//! document system.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelgate_core::testing::{MockEncoder, MockOracle, MemoryBlobStore, FixedClock};
//!
//! let encoder = MockEncoder::new();
//! let blobs = MemoryBlobStore::new();
//! let oracle = MockOracle::new();
//!
//! // Configure mock behavior
//! encoder.set_source(720, 120.0).await;
//! oracle.grant_page(42).await;
//!
//! // Use in a JobRunner / TokenIssuer...
//! ```

mod fixed_clock;
mod memory_blobs;
mod mock_encoder;
mod mock_oracle;

pub use fixed_clock::FixedClock;
pub use memory_blobs::MemoryBlobStore;
pub use mock_encoder::{MockEncoder, RecordedEncode};
pub use mock_oracle::{MockOracle, RecordedPageCheck};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::auth::{Identity, ManagementCredentials};
    use crate::encoder::MediaInfo;
    use crate::store::{CreateVideoRequest, Visibility};

    /// Create a 16:9 probe result of the given height.
    pub fn media_info(height: u32, duration_secs: f64) -> MediaInfo {
        MediaInfo {
            path: PathBuf::from("/input.mov"),
            size_bytes: 64 * 1024 * 1024,
            duration_secs,
            format: "mov".to_string(),
            video_codec: Some("h264".to_string()),
            width: Some(height * 16 / 9),
            height: Some(height),
            fps: Some(30.0),
            audio_codec: Some("aac".to_string()),
            audio_bitrate_kbps: Some(128),
        }
    }

    /// Create a video registration request with reasonable defaults.
    pub fn video_request(title: &str) -> CreateVideoRequest {
        CreateVideoRequest {
            title: title.to_string(),
            original_filename: format!("{}.mov", title.to_lowercase().replace(' ', "-")),
            uploaded_by: "tester".to_string(),
            visibility: Visibility::Public,
            page_id: None,
        }
    }

    /// Create a registration request for a page-protected video.
    pub fn page_video_request(title: &str, page_id: i64) -> CreateVideoRequest {
        CreateVideoRequest {
            visibility: Visibility::PageProtected,
            page_id: Some(page_id),
            ..video_request(title)
        }
    }

    /// Create a registration request for a private video.
    pub fn private_video_request(title: &str) -> CreateVideoRequest {
        CreateVideoRequest {
            visibility: Visibility::Private,
            ..video_request(title)
        }
    }

    /// Management credentials matching [`admin_identity`].
    pub fn manager_credentials() -> ManagementCredentials {
        ManagementCredentials::new("svc-token", "svc-secret")
    }

    /// The identity [`manager_credentials`] should verify to.
    pub fn admin_identity() -> Identity {
        Identity {
            user_id: 1,
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
        }
    }
}
