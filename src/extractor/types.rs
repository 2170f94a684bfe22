//! Typed records produced by explainer content discovery
//!
//! Every discovery pass emits tagged records instead of loose maps so the
//! aggregation, deduplication, and scoring steps can rely on the variant
//! rather than on string keys being present.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Discriminant for how a video reference was found in the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoKind {
    /// Native `<video>` element
    VideoElement,
    /// Anchor link to a known video platform
    VideoLink,
    /// `<embed>` / `<object>` player
    VideoEmbed,
    /// Image thumbnail that advertises a video
    Thumbnail,
    /// DOM container whose class/id suggests a player
    Container,
}

/// Which pass produced a record. Diagnostic only; deduplication treats
/// structural and fallback findings identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoProvenance {
    Structural,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    #[serde(rename = "type")]
    pub kind: VideoKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub source: VideoProvenance,
}

impl VideoRecord {
    pub fn structural(kind: VideoKind, url: Option<String>, title: Option<String>) -> Self {
        Self {
            kind,
            url,
            title,
            source: VideoProvenance::Structural,
        }
    }

    pub fn fallback(url: String) -> Self {
        Self {
            kind: VideoKind::VideoLink,
            url: Some(url),
            title: None,
            source: VideoProvenance::Fallback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Text block role, mirrored from the selector family that matched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    Content,
    Tutorial,
    Instruction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRecord {
    pub kind: TextKind,
    pub text: String,
}

/// Counts collected while walking the page. Diagnostic only — never an
/// input to success/failure decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryMetadata {
    pub iframes_found: usize,
    pub videos_discovered: usize,
    pub text_areas_found: usize,
    pub fallback_videos: usize,
}

/// Aggregated output of one extraction attempt. Created fresh per attempt
/// and fully replaced on re-scrape; never merged with prior results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub workflow_id: String,
    pub videos: Vec<VideoRecord>,
    pub text_content: String,
    pub images: Vec<ImageRecord>,
    pub code_snippets: Vec<String>,
    /// 0-100, recomputed each run from the other fields.
    pub quality_score: u8,
    pub discovery_metadata: DiscoveryMetadata,
    /// Per-video transcripts, keyed by canonical video id. Populated only
    /// when transcript extraction is enabled.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub transcripts: BTreeMap<String, String>,
}

/// Wire shape returned to callers and written into the layer-3 columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub success: bool,
    pub workflow_id: String,
    pub extraction_time_seconds: f64,
    pub quality_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionData {
    pub videos: Vec<VideoRecord>,
    pub video_count: usize,
    pub tutorial_text: String,
    pub images: Vec<ImageRecord>,
    pub code_snippets: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub transcripts: BTreeMap<String, String>,
    pub discovery_metadata: DiscoveryMetadata,
}

impl ExtractionOutcome {
    pub fn from_result(result: ExtractionResult, elapsed_seconds: f64) -> Self {
        Self {
            success: true,
            workflow_id: result.workflow_id.clone(),
            extraction_time_seconds: elapsed_seconds,
            quality_score: result.quality_score,
            data: Some(ExtractionData {
                video_count: result.videos.len(),
                videos: result.videos,
                tutorial_text: result.text_content,
                images: result.images,
                code_snippets: result.code_snippets,
                transcripts: result.transcripts,
                discovery_metadata: result.discovery_metadata,
            }),
            error: None,
        }
    }

    pub fn failed(workflow_id: &str, elapsed_seconds: f64, error: impl ToString) -> Self {
        Self {
            success: false,
            workflow_id: workflow_id.to_string(),
            extraction_time_seconds: elapsed_seconds,
            quality_score: 0,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_record_type_tag_serializes_snake_case() {
        let record = VideoRecord::structural(
            VideoKind::VideoLink,
            Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
            None,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "video_link");
        assert_eq!(value["source"], "structural");
        assert!(value.get("title").is_none());
    }

    #[test]
    fn failed_outcome_carries_no_data() {
        let outcome = ExtractionOutcome::failed("7639", 1.25, "navigation timeout");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["quality_score"], 0);
        assert!(value.get("data").is_none());
        assert_eq!(value["error"], "navigation timeout");
    }

    #[test]
    fn successful_outcome_counts_videos() {
        let result = ExtractionResult {
            workflow_id: "2462".to_string(),
            videos: vec![VideoRecord::fallback("https://youtu.be/abcdefghijk".to_string())],
            text_content: "Setup guide".to_string(),
            images: Vec::new(),
            code_snippets: Vec::new(),
            quality_score: 55,
            discovery_metadata: DiscoveryMetadata::default(),
            transcripts: BTreeMap::new(),
        };
        let outcome = ExtractionOutcome::from_result(result, 3.0);
        let data = outcome.data.unwrap();
        assert_eq!(data.video_count, 1);
        assert!(outcome.success);
    }
}
