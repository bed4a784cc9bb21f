//! Adaptive-streaming manifest handling.
//!
//! The package stage writes a master playlist enumerating available
//! qualities with bandwidth hints; players pick a rendition and follow its
//! media playlist. At serve time the viewer token has to ride along on
//! every URI a player will fetch next, so playlists are rewritten per
//! request rather than stored with credentials baked in.

use crate::store::Variant;

/// Builds the master playlist for the given variants, best quality first.
pub fn master_playlist(variants: &[Variant]) -> String {
    let mut ordered: Vec<&Variant> = variants.iter().collect();
    ordered.sort_by(|a, b| b.height.cmp(&a.height));

    let mut lines = vec!["#EXTM3U".to_string(), "#EXT-X-VERSION:3".to_string()];
    for variant in ordered {
        lines.push(format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}",
            variant.bitrate_kbps as u64 * 1000,
            variant.width,
            variant.height
        ));
        lines.push(format!("{}/playlist.m3u8", variant.quality));
    }

    lines.join("\n") + "\n"
}

/// Appends `?token=` to every URI line of a playlist.
///
/// Works for both playlist kinds: master playlists reference
/// `{quality}/playlist.m3u8`, media playlists reference `segment_NNN.ts`.
/// Comment and tag lines pass through untouched.
pub fn inject_token(playlist: &str, token: &str) -> String {
    let mut out = String::with_capacity(playlist.len() + 64);
    for line in playlist.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty()
            && !trimmed.starts_with('#')
            && (trimmed.ends_with(".ts") || trimmed.ends_with(".m3u8"))
        {
            out.push_str(line);
            out.push_str("?token=");
            out.push_str(token);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn variant(quality: &str, width: u32, height: u32, bitrate_kbps: u32) -> Variant {
        Variant {
            id: format!("var-{}", quality),
            video_id: "vid".to_string(),
            quality: quality.to_string(),
            width,
            height,
            bitrate_kbps,
            path: format!("vid/transcoded/{}/playlist.m3u8", quality),
            size_bytes: 1024,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_master_playlist_orders_tallest_first() {
        let playlist = master_playlist(&[
            variant("480p", 854, 480, 1000),
            variant("1080p", 1920, 1080, 5000),
            variant("720p", 1280, 720, 2500),
        ]);

        let lines: Vec<&str> = playlist.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXT-X-VERSION:3");
        assert_eq!(
            lines[2],
            "#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080"
        );
        assert_eq!(lines[3], "1080p/playlist.m3u8");
        assert_eq!(
            lines[4],
            "#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720"
        );
        assert_eq!(lines[5], "720p/playlist.m3u8");
        assert_eq!(lines[7], "480p/playlist.m3u8");
        assert!(playlist.ends_with('\n'));
    }

    #[test]
    fn test_master_playlist_empty_variants() {
        let playlist = master_playlist(&[]);
        assert_eq!(playlist, "#EXTM3U\n#EXT-X-VERSION:3\n");
    }

    #[test]
    fn test_inject_token_into_master() {
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720\n720p/playlist.m3u8\n";
        let rewritten = inject_token(master, "v1:vid:none:123:abc");

        assert!(rewritten.contains("720p/playlist.m3u8?token=v1:vid:none:123:abc"));
        assert!(rewritten.contains("#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720\n"));
    }

    #[test]
    fn test_inject_token_into_media_playlist() {
        let media = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nsegment_000.ts\n#EXTINF:4.2,\nsegment_001.ts\n#EXT-X-ENDLIST\n";
        let rewritten = inject_token(media, "tok");

        assert!(rewritten.contains("segment_000.ts?token=tok"));
        assert!(rewritten.contains("segment_001.ts?token=tok"));
        // Tag lines keep their values untouched
        assert!(rewritten.contains("#EXTINF:6.0,\n"));
        assert!(rewritten.contains("#EXT-X-ENDLIST"));
    }

    #[test]
    fn test_inject_token_leaves_other_lines_alone() {
        let playlist = "#EXTM3U\n\nnotes.txt\n";
        let rewritten = inject_token(playlist, "tok");
        assert_eq!(rewritten, "#EXTM3U\n\nnotes.txt\n");
    }
}
