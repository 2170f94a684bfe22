//! Regex fallback sweep over serialized page HTML
//!
//! Some gallery pages inject video references from client-side script after
//! load, in places structural DOM queries never see: JSON blobs, data
//! attributes, and the gallery's own `@[youtube](id)` markdown shorthand.
//! This pass re-scans the final serialized HTML for known URL and id shapes.
//! It is best-effort by design — content injected after the snapshot is
//! taken can still be missed, and a matching shape in unrelated markup can
//! produce a false positive. Neither is treated as a bug to retry.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::dedup::{canonical_video_id, CanonicalVideoId};
use super::types::VideoRecord;

static YOUTUBE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"https?://(?:www\.)?youtube\.com/watch\?v=([\w-]{11})",
        r"https?://(?:www\.)?youtube\.com/embed/([\w-]{11})",
        r"https?://youtu\.be/([\w-]{11})",
        r#""videoId":"([\w-]{11})""#,
        r#"data-video-id="([\w-]{11})""#,
        // Gallery markdown shorthand for embedded explainer videos.
        r"@\[youtube\]\(([\w-]{11})\)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static fallback pattern"))
    .collect()
});

static VIMEO_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"https?://(?:www\.)?vimeo\.com/(\d+)",
        r"https?://player\.vimeo\.com/video/(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static fallback pattern"))
    .collect()
});

/// Scan raw HTML for video references missed by structural discovery.
///
/// Matches are normalized to short canonical URLs and deduplicated within
/// the sweep itself; deduplication against structurally discovered records
/// happens later in the shared pass.
pub fn scan_for_videos(html: &str) -> Vec<VideoRecord> {
    let mut seen: HashSet<CanonicalVideoId> = HashSet::new();
    let mut records = Vec::new();

    for pattern in YOUTUBE_PATTERNS.iter() {
        for caps in pattern.captures_iter(html) {
            let url = format!("https://youtu.be/{}", &caps[1]);
            push_unique(&mut seen, &mut records, url);
        }
    }

    for pattern in VIMEO_PATTERNS.iter() {
        for caps in pattern.captures_iter(html) {
            let url = format!("https://vimeo.com/{}", &caps[1]);
            push_unique(&mut seen, &mut records, url);
        }
    }

    if !records.is_empty() {
        debug!(count = records.len(), "fallback sweep found video references");
    }

    records
}

fn push_unique(
    seen: &mut HashSet<CanonicalVideoId>,
    records: &mut Vec<VideoRecord>,
    url: String,
) {
    if let Some(id) = canonical_video_id(&url) {
        if seen.insert(id) {
            records.push(VideoRecord::fallback(url));
        }
    }
}
