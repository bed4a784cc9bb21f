//! Artifact inventory for stage resume.
//!
//! A restarted job must not redo work whose outputs already exist. The
//! survey reads one listing of the video's blob prefix and classifies what
//! is there, letting the runner skip finished presets, finished packaging,
//! and finished thumbnails.

use std::collections::{BTreeMap, BTreeSet};

use crate::storage::{paths, BlobStore, StorageError};

/// What already exists in storage for a video.
#[derive(Debug, Default)]
pub struct ArtifactSurvey {
    /// Path of the uploaded original, if present.
    pub original: Option<String>,
    /// Qualities with an intermediate rendition file.
    pub renditions: BTreeSet<String>,
    /// Qualities with a media playlist and at least one segment.
    pub packaged: BTreeSet<String>,
    /// Whether the master playlist exists.
    pub has_master: bool,
    /// Thumbnail offsets (percent) already extracted.
    pub thumbnails: BTreeSet<u32>,
}

impl ArtifactSurvey {
    /// Reads one listing of the video's prefix and classifies every path.
    pub async fn load(blobs: &dyn BlobStore, video_id: &str) -> Result<Self, StorageError> {
        let paths = blobs.list(&paths::video_prefix(video_id)).await?;
        Ok(Self::from_paths(video_id, &paths))
    }

    fn from_paths(video_id: &str, paths: &[String]) -> Self {
        let mut survey = Self::default();
        let mut playlists: BTreeSet<String> = BTreeSet::new();
        let mut segment_counts: BTreeMap<String, u32> = BTreeMap::new();

        let original_prefix = paths::original_prefix(video_id);
        let transcoded_prefix = paths::transcoded_prefix(video_id);
        let thumbnails_prefix = paths::thumbnails_prefix(video_id);
        let master = paths::master_playlist(video_id);

        for path in paths {
            if let Some(rest) = path.strip_prefix(&original_prefix) {
                if !rest.is_empty() {
                    survey.original = Some(path.clone());
                }
            } else if path == &master {
                survey.has_master = true;
            } else if let Some(rest) = path.strip_prefix(&transcoded_prefix) {
                let Some((quality, file)) = rest.split_once('/') else {
                    continue;
                };
                match file {
                    "rendition.mp4" => {
                        survey.renditions.insert(quality.to_string());
                    }
                    "playlist.m3u8" => {
                        playlists.insert(quality.to_string());
                    }
                    _ if file.starts_with("segment_") && file.ends_with(".ts") => {
                        *segment_counts.entry(quality.to_string()).or_insert(0) += 1;
                    }
                    _ => {}
                }
            } else if let Some(rest) = path.strip_prefix(&thumbnails_prefix) {
                if let Some(percent) = rest
                    .strip_prefix("thumb_")
                    .and_then(|r| r.strip_suffix(".jpg"))
                    .and_then(|r| r.parse::<u32>().ok())
                {
                    survey.thumbnails.insert(percent);
                }
            }
        }

        // A playlist without segments is a partial write, not a finished
        // packaging pass
        for quality in playlists {
            if segment_counts.get(&quality).copied().unwrap_or(0) > 0 {
                survey.packaged.insert(quality);
            }
        }

        survey
    }

    /// Whether the transcode stage still has work for this quality.
    pub fn needs_encode(&self, quality: &str) -> bool {
        !self.renditions.contains(quality) && !self.packaged.contains(quality)
    }

    /// Whether the package stage still has work for this quality.
    pub fn needs_packaging(&self, quality: &str) -> bool {
        !self.packaged.contains(quality)
    }

    /// Whether a thumbnail at this offset still has to be extracted.
    pub fn needs_thumbnail(&self, percent: u32) -> bool {
        !self.thumbnails.contains(&percent)
    }
}
