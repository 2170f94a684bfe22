//! Canonical video identity and cross-pass deduplication
//!
//! The same video routinely surfaces several times per page: as an anchor,
//! as an embed, and again in the fallback regex sweep. Each platform has a
//! handful of URL shapes that all point at one video, so records are grouped
//! by a platform-normalized id before anything downstream counts them.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::VideoRecord;

/// Platform-normalized identity for a discovered video.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalVideoId {
    YouTube(String),
    Vimeo(String),
    /// Direct media or unrecognized platform; identity is the trimmed URL.
    Other(String),
}

static YOUTUBE_ID: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"youtube\.com/watch\?(?:[^&\s]*&)*v=([\w-]{11})",
        r"youtube\.com/embed/([\w-]{11})",
        r"youtube\.com/shorts/([\w-]{11})",
        r"youtu\.be/([\w-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static youtube pattern"))
    .collect()
});

static YOUTUBE_NON_VIDEO: Lazy<Regex> = Lazy::new(|| {
    // Channel, handle, user, and playlist URLs carry no single video identity.
    Regex::new(r"youtube\.com/(?:c/|@|user/|playlist)").expect("static youtube filter")
});

static VIMEO_ID: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"player\.vimeo\.com/video/(\d+)",
        r"vimeo\.com/(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static vimeo pattern"))
    .collect()
});

/// Extract the canonical id for a video URL.
///
/// Returns `None` for URLs that reference a platform but not a single video
/// (channels, playlists) — those are not videos and must not collide with
/// real ids during grouping.
pub fn canonical_video_id(url: &str) -> Option<CanonicalVideoId> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.contains("youtube.com") || trimmed.contains("youtu.be") {
        if YOUTUBE_NON_VIDEO.is_match(trimmed) {
            return None;
        }
        for pattern in YOUTUBE_ID.iter() {
            if let Some(caps) = pattern.captures(trimmed) {
                return Some(CanonicalVideoId::YouTube(caps[1].to_string()));
            }
        }
        return None;
    }

    if trimmed.contains("vimeo.com") {
        for pattern in VIMEO_ID.iter() {
            if let Some(caps) = pattern.captures(trimmed) {
                return Some(CanonicalVideoId::Vimeo(caps[1].to_string()));
            }
        }
        return None;
    }

    Some(CanonicalVideoId::Other(trimmed.to_string()))
}

/// Collapse duplicate video records across all discovery passes.
///
/// Grouping key is the canonical id; the first occurrence wins and keeps its
/// metadata (insertion order is the tie-break). Records that resolve to no
/// canonical id — player containers without a URL, channel links — are kept
/// unless they are exact repeats of an earlier keyless record.
///
/// Output length is always <= input length, and `dedup(dedup(l)) == dedup(l)`.
pub fn dedup_videos(videos: Vec<VideoRecord>) -> Vec<VideoRecord> {
    let mut seen_ids: HashSet<CanonicalVideoId> = HashSet::new();
    let mut seen_keyless: HashSet<(String, String)> = HashSet::new();
    let mut out = Vec::with_capacity(videos.len());

    for record in videos {
        let id = record.url.as_deref().and_then(canonical_video_id);
        match id {
            Some(id) => {
                if seen_ids.insert(id) {
                    out.push(record);
                }
            }
            None => {
                let key = (
                    format!("{:?}", record.kind),
                    record.title.clone().unwrap_or_default(),
                );
                if seen_keyless.insert(key) {
                    out.push(record);
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::types::{VideoKind, VideoRecord};

    fn link(url: &str) -> VideoRecord {
        VideoRecord::structural(VideoKind::VideoLink, Some(url.to_string()), None)
    }

    #[test]
    fn watch_and_short_urls_share_an_id() {
        let a = canonical_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        let b = canonical_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let c = canonical_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn watch_url_with_leading_params_still_resolves() {
        let id = canonical_video_id("https://www.youtube.com/watch?t=42&v=dQw4w9WgXcQ").unwrap();
        assert_eq!(id, CanonicalVideoId::YouTube("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn channel_and_playlist_urls_are_not_videos() {
        assert_eq!(canonical_video_id("https://youtube.com/c/n8n-io"), None);
        assert_eq!(canonical_video_id("https://www.youtube.com/@n8n_io"), None);
        assert_eq!(
            canonical_video_id("https://www.youtube.com/playlist?list=PL123"),
            None
        );
    }

    #[test]
    fn vimeo_player_and_page_urls_share_an_id() {
        let a = canonical_video_id("https://vimeo.com/76979871").unwrap();
        let b = canonical_video_id("https://player.vimeo.com/video/76979871").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, CanonicalVideoId::Vimeo("76979871".to_string()));
    }

    #[test]
    fn dedup_collapses_url_shape_variants() {
        let input = vec![
            link("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            link("https://youtu.be/dQw4w9WgXcQ"),
            link("https://vimeo.com/76979871"),
        ];
        let out = dedup_videos(input);
        assert_eq!(out.len(), 2);
        // First occurrence keeps its metadata.
        assert_eq!(
            out[0].url.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
    }

    #[test]
    fn dedup_is_idempotent() {
        let input = vec![
            link("https://youtu.be/aaaaaaaaaaa"),
            link("https://youtu.be/aaaaaaaaaaa"),
            link("https://youtu.be/bbbbbbbbbbb"),
            VideoRecord::structural(VideoKind::Container, None, Some("video-player".to_string())),
        ];
        let once = dedup_videos(input);
        let twice = dedup_videos(once.clone());
        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(dedup_videos(Vec::new()).is_empty());
    }

    #[test]
    fn keyless_records_survive_unless_exact_repeats() {
        let container =
            VideoRecord::structural(VideoKind::Container, None, Some("player-wrap".to_string()));
        let out = dedup_videos(vec![container.clone(), container.clone()]);
        assert_eq!(out.len(), 1);
    }
}
