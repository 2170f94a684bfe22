//! Multi-strategy content discovery over document snapshots
//!
//! Discoverers are polymorphic over one capability: scan a document, return
//! typed records. Each concrete discoverer (video, text, image, code) runs
//! independently against every document the iframe walk produced plus the
//! main page snapshot. Video discovery is deliberately redundant — all
//! strategies execute, none short-circuit, and duplicate findings across
//! strategies are expected and resolved later by deduplication, not
//! prevented here. No match under any strategy is not an error; it yields
//! an empty list.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{ImageRecord, TextKind, TextRecord, VideoKind, VideoRecord};
use crate::extractor::dedup::canonical_video_id;

/// Text blocks shorter than this are discarded as noise (nav labels,
/// button captions, stray glyphs).
pub const MIN_TEXT_LEN: usize = 10;

/// Where a scanned document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOrigin {
    MainPage,
    Iframe {
        src: Option<String>,
        /// True when the document body was obtained by fetching the iframe
        /// `src` over HTTP because the content frame was cross-origin.
        via_fetch: bool,
    },
}

impl DocumentOrigin {
    pub fn describe(&self) -> String {
        match self {
            DocumentOrigin::MainPage => "main page".to_string(),
            DocumentOrigin::Iframe { src, via_fetch } => format!(
                "iframe {}{}",
                src.as_deref().unwrap_or("<no src>"),
                if *via_fetch { " (fetched)" } else { "" }
            ),
        }
    }
}

/// One scannable document: the serialized main page or an iframe's content
/// document (live or HTTP-fetched surrogate).
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub origin: DocumentOrigin,
    pub html: String,
}

impl DocumentSnapshot {
    pub fn main_page(html: String) -> Self {
        Self {
            origin: DocumentOrigin::MainPage,
            html,
        }
    }

    pub fn iframe(src: Option<String>, via_fetch: bool, html: String) -> Self {
        Self {
            origin: DocumentOrigin::Iframe { src, via_fetch },
            html,
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

fn parse_selector(selector: &str) -> Result<Selector, DiscoveryError> {
    Selector::parse(selector).map_err(|e| DiscoveryError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// A typed finding from one discoverer.
#[derive(Debug, Clone)]
pub enum ContentRecord {
    Video(VideoRecord),
    Text(TextRecord),
    Image(ImageRecord),
    Code(String),
}

/// Scan a document and return typed records.
///
/// Implementations must treat "nothing matched" as an empty list, not an
/// error. A returned error means the scan itself could not run; the caller
/// logs it and continues with the other discoverers and documents.
pub trait ContentDiscoverer: Send + Sync {
    fn name(&self) -> &'static str;
    fn scan(&self, doc: &DocumentSnapshot) -> Result<Vec<ContentRecord>, DiscoveryError>;
}

/// The stock discoverer set, in the order their findings are aggregated.
pub fn default_discoverers() -> Vec<Box<dyn ContentDiscoverer>> {
    vec![
        Box::new(VideoDiscoverer),
        Box::new(TextDiscoverer),
        Box::new(ImageDiscoverer),
        Box::new(CodeDiscoverer),
    ]
}

/// Aggregated output of all discoverers over all documents, insertion order
/// preserved per record type.
#[derive(Debug, Default)]
pub struct DiscoveryOutput {
    pub videos: Vec<VideoRecord>,
    pub texts: Vec<TextRecord>,
    pub images: Vec<ImageRecord>,
    pub code_snippets: Vec<String>,
}

/// Run every discoverer against every document.
///
/// Failure of one discoverer on one document contributes nothing for that
/// pair and never aborts the rest of the scan.
pub fn scan_documents(
    discoverers: &[Box<dyn ContentDiscoverer>],
    docs: &[DocumentSnapshot],
) -> DiscoveryOutput {
    let mut output = DiscoveryOutput::default();

    for doc in docs {
        for discoverer in discoverers {
            match discoverer.scan(doc) {
                Ok(records) => {
                    for record in records {
                        match record {
                            ContentRecord::Video(v) => output.videos.push(v),
                            ContentRecord::Text(t) => output.texts.push(t),
                            ContentRecord::Image(i) => output.images.push(i),
                            ContentRecord::Code(c) => output.code_snippets.push(c),
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        discoverer = discoverer.name(),
                        document = %doc.origin.describe(),
                        error = %e,
                        "discoverer failed, continuing without its records"
                    );
                }
            }
        }
    }

    debug!(
        videos = output.videos.len(),
        texts = output.texts.len(),
        images = output.images.len(),
        code = output.code_snippets.len(),
        "structural discovery complete"
    );

    output
}

// ---------------------------------------------------------------------------
// Video discovery
// ---------------------------------------------------------------------------

pub struct VideoDiscoverer;

type VideoStrategy = fn(&Html) -> Result<Vec<VideoRecord>, DiscoveryError>;

/// All strategies run; duplicates across them are resolved by dedup later.
const VIDEO_STRATEGIES: &[(&str, VideoStrategy)] = &[
    ("video_elements", scan_video_elements),
    ("platform_links", scan_platform_links),
    ("embeds", scan_embeds),
    ("thumbnails", scan_thumbnails),
    ("player_containers", scan_player_containers),
];

impl ContentDiscoverer for VideoDiscoverer {
    fn name(&self) -> &'static str {
        "video"
    }

    fn scan(&self, doc: &DocumentSnapshot) -> Result<Vec<ContentRecord>, DiscoveryError> {
        let html = Html::parse_document(&doc.html);
        let mut records = Vec::new();

        for (strategy, run) in VIDEO_STRATEGIES.iter().copied() {
            match run(&html) {
                Ok(found) => records.extend(found.into_iter().map(ContentRecord::Video)),
                Err(e) => {
                    // One failed strategy must not cost the others their
                    // findings for this document.
                    warn!(
                        strategy,
                        document = %doc.origin.describe(),
                        error = %e,
                        "video strategy failed"
                    );
                }
            }
        }

        Ok(records)
    }
}

fn scan_video_elements(html: &Html) -> Result<Vec<VideoRecord>, DiscoveryError> {
    let video_sel = parse_selector("video")?;
    let source_sel = parse_selector("source[src]")?;
    let mut records = Vec::new();

    for el in html.select(&video_sel) {
        let src = el
            .value()
            .attr("src")
            .map(str::to_string)
            .or_else(|| {
                el.select(&source_sel)
                    .next()
                    .and_then(|s| s.value().attr("src"))
                    .map(str::to_string)
            });
        records.push(VideoRecord::structural(VideoKind::VideoElement, src, None));
    }

    Ok(records)
}

fn scan_platform_links(html: &Html) -> Result<Vec<VideoRecord>, DiscoveryError> {
    let anchor_sel = parse_selector("a[href]")?;
    let mut records = Vec::new();

    for el in html.select(&anchor_sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if !(href.contains("youtube.com") || href.contains("youtu.be") || href.contains("vimeo.com"))
        {
            continue;
        }
        // Channel, handle, and playlist links match the domain but carry no
        // video identity; skip them here rather than polluting dedup input.
        if canonical_video_id(href).is_none() {
            continue;
        }
        let title = el
            .value()
            .attr("title")
            .map(str::to_string)
            .or_else(|| non_empty(element_text(&el)));
        records.push(VideoRecord::structural(
            VideoKind::VideoLink,
            Some(href.to_string()),
            title,
        ));
    }

    Ok(records)
}

fn scan_embeds(html: &Html) -> Result<Vec<VideoRecord>, DiscoveryError> {
    let embed_sel = parse_selector("embed[src], object[data]")?;
    let mut records = Vec::new();

    for el in html.select(&embed_sel) {
        let target = el.value().attr("src").or_else(|| el.value().attr("data"));
        let Some(target) = target else { continue };
        let lowered = target.to_ascii_lowercase();
        let looks_like_video = ["video", "youtube", "vimeo", "player", ".mp4", ".webm"]
            .iter()
            .any(|hint| lowered.contains(hint));
        if looks_like_video {
            records.push(VideoRecord::structural(
                VideoKind::VideoEmbed,
                Some(target.to_string()),
                None,
            ));
        }
    }

    Ok(records)
}

fn scan_thumbnails(html: &Html) -> Result<Vec<VideoRecord>, DiscoveryError> {
    let img_sel = parse_selector("img")?;
    let mut records = Vec::new();

    for el in html.select(&img_sel) {
        let alt = el.value().attr("alt").unwrap_or_default();
        let src = el.value().attr("src").unwrap_or_default();
        let class = el.value().attr("class").unwrap_or_default();
        let suggests_video = alt.to_ascii_lowercase().contains("video")
            || src.to_ascii_lowercase().contains("video")
            || class.to_ascii_lowercase().contains("video");
        if suggests_video {
            records.push(VideoRecord::structural(
                VideoKind::Thumbnail,
                non_empty(src.to_string()),
                non_empty(alt.to_string()),
            ));
        }
    }

    Ok(records)
}

fn scan_player_containers(html: &Html) -> Result<Vec<VideoRecord>, DiscoveryError> {
    let container_sel = parse_selector(
        r#"div[class*="player"], div[id*="player"], div[class*="video"], div[id*="video"]"#,
    )?;
    let mut records = Vec::new();

    for el in html.select(&container_sel) {
        let label = el
            .value()
            .attr("class")
            .or_else(|| el.value().attr("id"))
            .unwrap_or_default();
        records.push(VideoRecord::structural(
            VideoKind::Container,
            None,
            non_empty(label.to_string()),
        ));
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Text discovery
// ---------------------------------------------------------------------------

pub struct TextDiscoverer;

impl ContentDiscoverer for TextDiscoverer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn scan(&self, doc: &DocumentSnapshot) -> Result<Vec<ContentRecord>, DiscoveryError> {
        let html = Html::parse_document(&doc.html);
        let mut records = Vec::new();

        let families: &[(TextKind, &str)] = &[
            (TextKind::Content, "p, h1, h2, h3, h4, h5, h6, li, td, th"),
            (
                TextKind::Tutorial,
                r#"[class*="tutorial"], [class*="explainer"], [class*="guide"], [class*="step"]"#,
            ),
            (
                TextKind::Instruction,
                r#"[class*="instruction"], [class*="description"], [class*="setup"]"#,
            ),
        ];

        for (kind, selector) in families {
            let sel = parse_selector(selector)?;
            for el in html.select(&sel) {
                let text = element_text(&el);
                if text.len() > MIN_TEXT_LEN {
                    records.push(ContentRecord::Text(TextRecord { kind: *kind, text }));
                }
            }
        }

        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Image discovery
// ---------------------------------------------------------------------------

pub struct ImageDiscoverer;

impl ContentDiscoverer for ImageDiscoverer {
    fn name(&self) -> &'static str {
        "image"
    }

    fn scan(&self, doc: &DocumentSnapshot) -> Result<Vec<ContentRecord>, DiscoveryError> {
        let html = Html::parse_document(&doc.html);
        let img_sel = parse_selector("img[src]")?;
        let mut records = Vec::new();

        for el in html.select(&img_sel) {
            let Some(src) = el.value().attr("src") else {
                continue;
            };
            if src.trim().is_empty() {
                continue;
            }
            records.push(ContentRecord::Image(ImageRecord {
                url: src.to_string(),
                alt: el
                    .value()
                    .attr("alt")
                    .and_then(|a| non_empty(a.to_string())),
            }));
        }

        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Code discovery
// ---------------------------------------------------------------------------

pub struct CodeDiscoverer;

static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(.*?)```").expect("static fenced-code pattern"));
static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("static inline-code pattern"));

impl ContentDiscoverer for CodeDiscoverer {
    fn name(&self) -> &'static str {
        "code"
    }

    fn scan(&self, doc: &DocumentSnapshot) -> Result<Vec<ContentRecord>, DiscoveryError> {
        let html = Html::parse_document(&doc.html);
        let mut records = Vec::new();

        let pre_sel = parse_selector("pre")?;
        for el in html.select(&pre_sel) {
            if let Some(text) = non_empty(element_text(&el)) {
                records.push(ContentRecord::Code(text));
            }
        }

        // Bare <code> spans, skipping those already captured inside <pre>.
        let code_sel = parse_selector("code")?;
        for el in html.select(&code_sel) {
            if has_pre_ancestor(&el) {
                continue;
            }
            if let Some(text) = non_empty(element_text(&el)) {
                records.push(ContentRecord::Code(text));
            }
        }

        // Markdown-style fences and inline backticks survive in rendered
        // text on some gallery pages; scan the document's full text too.
        let body_text = html.root_element().text().collect::<String>();
        for caps in FENCED_CODE.captures_iter(&body_text) {
            if let Some(text) = non_empty(caps[1].to_string()) {
                records.push(ContentRecord::Code(text));
            }
        }
        for caps in INLINE_CODE.captures_iter(&body_text) {
            if let Some(text) = non_empty(caps[1].to_string()) {
                records.push(ContentRecord::Code(text));
            }
        }

        Ok(records)
    }
}

fn has_pre_ancestor(el: &ElementRef) -> bool {
    el.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| e.name() == "pre")
    })
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_doc(html: &str) -> DocumentSnapshot {
        DocumentSnapshot::main_page(html.to_string())
    }

    fn videos_of(records: Vec<ContentRecord>) -> Vec<VideoRecord> {
        records
            .into_iter()
            .filter_map(|r| match r {
                ContentRecord::Video(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn all_video_strategies_fire_on_one_document() {
        let html = r#"
            <video src="/media/intro.mp4"></video>
            <a href="https://youtu.be/dQw4w9WgXcQ" title="Intro">watch the intro</a>
            <embed src="https://player.vimeo.com/video/123456" />
            <img src="/thumbs/video-cover.png" alt="video walkthrough" />
            <div class="workflow-player" id="hero"></div>
        "#;
        let found = videos_of(VideoDiscoverer.scan(&main_doc(html)).unwrap());
        let kinds: Vec<VideoKind> = found.iter().map(|v| v.kind).collect();
        assert!(kinds.contains(&VideoKind::VideoElement));
        assert!(kinds.contains(&VideoKind::VideoLink));
        assert!(kinds.contains(&VideoKind::VideoEmbed));
        assert!(kinds.contains(&VideoKind::Thumbnail));
        assert!(kinds.contains(&VideoKind::Container));
    }

    #[test]
    fn channel_links_are_not_recorded_as_videos() {
        let html = r#"<a href="https://www.youtube.com/@n8n_io">our channel</a>"#;
        let found = videos_of(VideoDiscoverer.scan(&main_doc(html)).unwrap());
        assert!(found.is_empty());
    }

    #[test]
    fn video_element_src_falls_back_to_source_child() {
        let html = r#"<video><source src="/media/clip.webm" type="video/webm"></video>"#;
        let found = videos_of(VideoDiscoverer.scan(&main_doc(html)).unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url.as_deref(), Some("/media/clip.webm"));
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let found = VideoDiscoverer
            .scan(&main_doc("<p>just words</p>"))
            .unwrap();
        assert!(videos_of(found).is_empty());
    }

    #[test]
    fn short_text_is_discarded_as_noise() {
        let html = r#"<p>ok</p><p>This paragraph is comfortably past the noise threshold.</p>"#;
        let records = TextDiscoverer.scan(&main_doc(html)).unwrap();
        let texts: Vec<String> = records
            .into_iter()
            .filter_map(|r| match r {
                ContentRecord::Text(t) => Some(t.text),
                _ => None,
            })
            .collect();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("This paragraph"));
    }

    #[test]
    fn tutorial_class_text_is_tagged() {
        let html = r#"<div class="setup-guide">Step one: create the credential first.</div>"#;
        let records = TextDiscoverer.scan(&main_doc(html)).unwrap();
        let kinds: Vec<TextKind> = records
            .iter()
            .filter_map(|r| match r {
                ContentRecord::Text(t) => Some(t.kind),
                _ => None,
            })
            .collect();
        assert!(kinds.contains(&TextKind::Tutorial));
    }

    #[test]
    fn images_keep_alt_text() {
        let html = r#"<img src="/shots/step1.png" alt="Credentials screen" /><img src="  " />"#;
        let records = ImageDiscoverer.scan(&main_doc(html)).unwrap();
        let images: Vec<ImageRecord> = records
            .into_iter()
            .filter_map(|r| match r {
                ContentRecord::Image(i) => Some(i),
                _ => None,
            })
            .collect();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].alt.as_deref(), Some("Credentials screen"));
    }

    #[test]
    fn code_blocks_and_fences_are_found_once_each() {
        let html = r#"
            <pre><code>{"node": "Webhook"}</code></pre>
            <p>Set the header to <code>application/json</code> before running.</p>
        "#;
        let records = CodeDiscoverer.scan(&main_doc(html)).unwrap();
        let snippets: Vec<String> = records
            .into_iter()
            .filter_map(|r| match r {
                ContentRecord::Code(c) => Some(c),
                _ => None,
            })
            .collect();
        // The pre block once (not doubled by its inner <code>), plus the
        // inline span.
        assert_eq!(snippets.len(), 2);
        assert!(snippets.iter().any(|s| s.contains("Webhook")));
        assert!(snippets.iter().any(|s| s == "application/json"));
    }

    #[test]
    fn scan_documents_aggregates_across_docs_in_order() {
        let docs = vec![
            main_doc(r#"<p>Main page paragraph that is long enough to keep.</p>"#),
            DocumentSnapshot::iframe(
                Some("https://example.com/embed".to_string()),
                true,
                r#"<a href="https://youtu.be/dQw4w9WgXcQ">demo</a>"#.to_string(),
            ),
        ];
        let discoverers = default_discoverers();
        let output = scan_documents(&discoverers, &docs);
        assert_eq!(output.videos.len(), 1);
        assert_eq!(output.texts.len(), 1);
    }

    struct FailingDiscoverer;

    impl ContentDiscoverer for FailingDiscoverer {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn scan(&self, _doc: &DocumentSnapshot) -> Result<Vec<ContentRecord>, DiscoveryError> {
            Err(DiscoveryError::InvalidSelector {
                selector: "](bad".to_string(),
                message: "unparseable".to_string(),
            })
        }
    }

    #[test]
    fn failing_discoverer_does_not_abort_the_scan() {
        let docs = vec![main_doc(
            r#"<p>Still extracted even when a sibling discoverer fails.</p>"#,
        )];
        let discoverers: Vec<Box<dyn ContentDiscoverer>> =
            vec![Box::new(FailingDiscoverer), Box::new(TextDiscoverer)];
        let output = scan_documents(&discoverers, &docs);
        assert_eq!(output.texts.len(), 1);
    }
}
