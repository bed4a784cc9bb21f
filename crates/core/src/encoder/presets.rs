//! Quality presets and the rules for applying them to a source.

use serde::{Deserialize, Serialize};

use super::types::EncodeTarget;

/// A target rendition definition: label, height, and target bitrates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPreset {
    pub name: String,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl QualityPreset {
    fn new(name: &str, height: u32, video_bitrate_kbps: u32) -> Self {
        Self {
            name: name.to_string(),
            height,
            video_bitrate_kbps,
            audio_bitrate_kbps: 128,
        }
    }
}

/// The built-in quality ladder.
pub fn ladder() -> Vec<QualityPreset> {
    vec![
        QualityPreset::new("1080p", 1080, 5000),
        QualityPreset::new("720p", 720, 2500),
        QualityPreset::new("480p", 480, 1000),
        QualityPreset::new("360p", 360, 600),
    ]
}

/// Resolves configured preset names against the ladder, preserving ladder
/// order. Returns the first unknown name on failure.
pub fn ladder_from_names(names: &[String]) -> Result<Vec<QualityPreset>, String> {
    let all = ladder();
    for name in names {
        if !all.iter().any(|p| &p.name == name) {
            return Err(name.clone());
        }
    }
    Ok(all
        .into_iter()
        .filter(|p| names.iter().any(|n| n == &p.name))
        .collect())
}

/// Computes the renditions to produce for a source of the given height.
///
/// Presets taller than the source are skipped (renditions are never
/// upscaled). If that leaves nothing, the lowest preset is used with its
/// height clamped to the source, so every usable video yields at least one
/// rendition.
pub fn applicable_targets(source_height: u32, presets: &[QualityPreset]) -> Vec<EncodeTarget> {
    let mut applicable: Vec<&QualityPreset> = presets
        .iter()
        .filter(|p| p.height <= source_height)
        .collect();
    applicable.sort_by(|a, b| b.height.cmp(&a.height));

    if applicable.is_empty() {
        let lowest = match presets.iter().min_by_key(|p| p.height) {
            Some(preset) => preset,
            None => return Vec::new(),
        };
        return vec![EncodeTarget {
            quality: lowest.name.clone(),
            height: source_height,
            video_bitrate_kbps: lowest.video_bitrate_kbps,
            audio_bitrate_kbps: lowest.audio_bitrate_kbps,
        }];
    }

    applicable
        .into_iter()
        .map(|p| EncodeTarget {
            quality: p.name.clone(),
            height: p.height,
            video_bitrate_kbps: p.video_bitrate_kbps,
            audio_bitrate_kbps: p.audio_bitrate_kbps,
        })
        .collect()
}
