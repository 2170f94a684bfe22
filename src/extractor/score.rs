//! Heuristic extraction quality score
//!
//! Summarizes how much useful explainer content a run found as a single
//! 0-100 integer. The weights were tuned empirically against live gallery
//! pages; the binding contract is only that the score is bounded and never
//! decreases when more content is found.

use super::types::ExtractionResult;

const VIDEO_PRESENT: u8 = 40;
const VIDEO_MULTIPLE_BONUS: u8 = 10;
const TEXT_LONG: u8 = 30;
const TEXT_MEDIUM: u8 = 20;
const TEXT_SHORT: u8 = 10;
const CODE_PRESENT: u8 = 10;
const IMAGES_PRESENT: u8 = 10;
const IFRAMES_SEEN: u8 = 5;
const FALLBACK_HIT: u8 = 5;

/// Score an aggregated extraction result.
///
/// Pure function over the result's content fields; the `quality_score`
/// field already on the result is ignored.
pub fn quality_score(result: &ExtractionResult) -> u8 {
    let mut score: u32 = 0;

    let video_count = result.videos.len();
    if video_count >= 1 {
        score += u32::from(VIDEO_PRESENT);
    }
    if video_count >= 2 {
        score += u32::from(VIDEO_MULTIPLE_BONUS);
    }

    let text_len = result.text_content.len();
    if text_len > 1000 {
        score += u32::from(TEXT_LONG);
    } else if text_len > 500 {
        score += u32::from(TEXT_MEDIUM);
    } else if text_len > 100 {
        score += u32::from(TEXT_SHORT);
    }

    if !result.code_snippets.is_empty() {
        score += u32::from(CODE_PRESENT);
    }
    if !result.images.is_empty() {
        score += u32::from(IMAGES_PRESENT);
    }

    if result.discovery_metadata.iframes_found > 0 {
        score += u32::from(IFRAMES_SEEN);
    }
    if result.discovery_metadata.fallback_videos > 0 {
        score += u32::from(FALLBACK_HIT);
    }

    score.min(100) as u8
}
