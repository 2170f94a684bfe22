//! Optional per-video transcript extraction
//!
//! A slower, separate sub-step gated by `extract_transcripts`: for each
//! deduplicated YouTube video, fetch the watch page, pull the first caption
//! track URL out of the player JSON, fetch the timed-text XML, and flatten
//! it to plain text. Every step is best-effort — a video without captions
//! (or a watch page variant we cannot parse) simply contributes no
//! transcript and never fails the extraction.

use std::collections::BTreeMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::{debug, warn};

use crate::extractor::dedup::{canonical_video_id, CanonicalVideoId};
use crate::extractor::types::VideoRecord;

const TRANSCRIPT_TIMEOUT: Duration = Duration::from_secs(15);

static CAPTION_TRACK_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""captionTracks":\[\{"baseUrl":"([^"]+)""#).expect("static caption pattern")
});

pub struct TranscriptFetcher {
    http: reqwest::Client,
    watch_base: String,
}

impl TranscriptFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            watch_base: "https://www.youtube.com".to_string(),
        }
    }

    /// Point the fetcher at a different host. Used by tests; harmless
    /// otherwise.
    pub fn with_watch_base(http: reqwest::Client, watch_base: impl Into<String>) -> Self {
        Self {
            http,
            watch_base: watch_base.into(),
        }
    }

    /// Fetch transcripts for every YouTube video in the list, keyed by
    /// canonical video id. Videos on other platforms are skipped.
    pub async fn fetch_for_videos(&self, videos: &[VideoRecord]) -> BTreeMap<String, String> {
        let mut transcripts = BTreeMap::new();

        for record in videos {
            let Some(url) = record.url.as_deref() else {
                continue;
            };
            let Some(CanonicalVideoId::YouTube(video_id)) = canonical_video_id(url) else {
                continue;
            };
            if transcripts.contains_key(&video_id) {
                continue;
            }
            match self.fetch_transcript(&video_id).await {
                Some(text) => {
                    debug!(video_id = %video_id, chars = text.len(), "transcript extracted");
                    transcripts.insert(video_id, text);
                }
                None => {
                    debug!(video_id = %video_id, "no transcript available");
                }
            }
        }

        transcripts
    }

    async fn fetch_transcript(&self, video_id: &str) -> Option<String> {
        let watch_url = format!("{}/watch?v={}", self.watch_base, video_id);
        let watch_html = match self.get_text(&watch_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(video_id, "watch page fetch failed: {}", e);
                return None;
            }
        };

        let caps = CAPTION_TRACK_URL.captures(&watch_html)?;
        // The player JSON escapes ampersands; undo that before fetching.
        let track_url = caps[1].replace("\\u0026", "&").replace("\\/", "/");

        let xml = match self.get_text(&track_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(video_id, "timed-text fetch failed: {}", e);
                return None;
            }
        };

        let text = flatten_timed_text(&xml);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, reqwest::Error> {
        self.http
            .get(url)
            .timeout(TRANSCRIPT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

/// Flatten YouTube timed-text XML (`<text start=.. dur=..>..</text>`) to a
/// single whitespace-joined string with entities unescaped.
fn flatten_timed_text(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    let mut segments: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(t)) => {
                if let Ok(unescaped) = t.unescape() {
                    let trimmed = unescaped.trim().to_string();
                    if !trimmed.is_empty() {
                        segments.push(trimmed);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("timed-text parse stopped early: {}", e);
                break;
            }
        }
    }

    segments.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::types::{VideoKind, VideoRecord};

    #[test]
    fn timed_text_flattens_and_unescapes() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
            <transcript>
                <text start="0.0" dur="2.1">Connect the webhook</text>
                <text start="2.1" dur="3.0">then map fields &amp; save</text>
            </transcript>"#;
        assert_eq!(
            flatten_timed_text(xml),
            "Connect the webhook then map fields & save"
        );
    }

    #[test]
    fn empty_transcript_xml_flattens_to_empty() {
        assert_eq!(flatten_timed_text("<transcript></transcript>"), "");
    }

    #[tokio::test]
    async fn fetches_transcript_via_caption_track() {
        let mut server = mockito::Server::new_async().await;
        let track_path = "/api/timedtext";
        let watch_body = format!(
            r#"var ytInitialPlayerResponse = {{"captions":{{"captionTracks":[{{"baseUrl":"{}{}?lang=en&v=dQw4w9WgXcQ"}}]}}}};"#,
            server.url(),
            track_path
        );
        server
            .mock("GET", "/watch?v=dQw4w9WgXcQ")
            .with_status(200)
            .with_body(watch_body)
            .create_async()
            .await;
        server
            .mock(
                "GET",
                mockito::Matcher::Regex(format!("{}.*", regex::escape(track_path))),
            )
            .with_status(200)
            .with_body(r#"<transcript><text start="0" dur="1">hello there</text></transcript>"#)
            .create_async()
            .await;

        let fetcher =
            TranscriptFetcher::with_watch_base(reqwest::Client::new(), server.url());
        let videos = vec![VideoRecord::structural(
            VideoKind::VideoLink,
            Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
            None,
        )];
        let transcripts = fetcher.fetch_for_videos(&videos).await;
        assert_eq!(
            transcripts.get("dQw4w9WgXcQ").map(String::as_str),
            Some("hello there")
        );
    }

    #[tokio::test]
    async fn missing_captions_yield_no_transcript() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/watch?v=aaaaaaaaaaa")
            .with_status(200)
            .with_body("<html>no player json here</html>")
            .create_async()
            .await;

        let fetcher =
            TranscriptFetcher::with_watch_base(reqwest::Client::new(), server.url());
        let videos = vec![VideoRecord::structural(
            VideoKind::VideoLink,
            Some("https://youtu.be/aaaaaaaaaaa".to_string()),
            None,
        )];
        assert!(fetcher.fetch_for_videos(&videos).await.is_empty());
    }
}
