//! Blob path scheme.
//!
//! All artifacts of a video live under its id:
//!
//! ```text
//! {video_id}/original/{filename}
//! {video_id}/transcoded/master.m3u8
//! {video_id}/transcoded/{quality}/rendition.mp4
//! {video_id}/transcoded/{quality}/playlist.m3u8
//! {video_id}/transcoded/{quality}/segment_000.ts
//! {video_id}/thumbnails/thumb_25.jpg
//! ```

/// Prefix owning every artifact of a video.
pub fn video_prefix(video_id: &str) -> String {
    format!("{}/", video_id)
}

/// Directory prefix of the uploaded original.
pub fn original_prefix(video_id: &str) -> String {
    format!("{}/original/", video_id)
}

/// Path of the uploaded original file.
pub fn original(video_id: &str, filename: &str) -> String {
    format!("{}/original/{}", video_id, filename)
}

/// Prefix of all transcoded artifacts.
pub fn transcoded_prefix(video_id: &str) -> String {
    format!("{}/transcoded/", video_id)
}

/// Prefix of one quality's artifacts.
pub fn quality_prefix(video_id: &str, quality: &str) -> String {
    format!("{}/transcoded/{}/", video_id, quality)
}

/// Intermediate single-file rendition for a quality.
pub fn rendition(video_id: &str, quality: &str) -> String {
    format!("{}/transcoded/{}/rendition.mp4", video_id, quality)
}

/// Media playlist for a quality.
pub fn playlist(video_id: &str, quality: &str) -> String {
    format!("{}/transcoded/{}/playlist.m3u8", video_id, quality)
}

/// One segment of a quality's rendition.
pub fn segment(video_id: &str, quality: &str, index: u32) -> String {
    format!("{}/transcoded/{}/segment_{:03}.ts", video_id, quality, index)
}

/// Top-level master playlist enumerating available qualities.
pub fn master_playlist(video_id: &str) -> String {
    format!("{}/transcoded/master.m3u8", video_id)
}

/// Prefix of all thumbnails.
pub fn thumbnails_prefix(video_id: &str) -> String {
    format!("{}/thumbnails/", video_id)
}

/// Still-frame thumbnail at a relative offset (percent of duration).
pub fn thumbnail(video_id: &str, percent: u32) -> String {
    format!("{}/thumbnails/thumb_{}.jpg", video_id, percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_video_prefix() {
        let id = "b2c0a4de";
        for path in [
            original(id, "clip.mov"),
            rendition(id, "720p"),
            playlist(id, "720p"),
            segment(id, "720p", 12),
            master_playlist(id),
            thumbnail(id, 25),
        ] {
            assert!(path.starts_with(&video_prefix(id)), "{}", path);
        }
    }

    #[test]
    fn test_segment_zero_padded() {
        assert_eq!(segment("v", "480p", 0), "v/transcoded/480p/segment_000.ts");
        assert_eq!(segment("v", "480p", 7), "v/transcoded/480p/segment_007.ts");
        assert_eq!(
            segment("v", "480p", 123),
            "v/transcoded/480p/segment_123.ts"
        );
    }

    #[test]
    fn test_quality_prefix_contains_its_artifacts() {
        let prefix = quality_prefix("v", "1080p");
        assert!(rendition("v", "1080p").starts_with(&prefix));
        assert!(playlist("v", "1080p").starts_with(&prefix));
        assert!(segment("v", "1080p", 3).starts_with(&prefix));
        assert!(!master_playlist("v").starts_with(&prefix));
    }
}
