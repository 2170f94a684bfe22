//! Explainer content extraction (layer 3)
//!
//! Multi-pass content discovery for a workflow's public page: navigate,
//! walk iframes (with cross-origin fetch fallback), run every content
//! discoverer over every document, regex-sweep the serialized HTML for
//! late-bound video references, deduplicate, and score.
//!
//! Once navigation has succeeded the pipeline only degrades — missing or
//! unreadable content shrinks the result, it never fails the extraction.

pub mod dedup;
pub mod discover;
pub mod fallback;
pub mod iframe;
pub mod navigate;
pub mod score;
pub mod types;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::browser::BrowserWrapper;
use crate::transcript::TranscriptFetcher;
use crate::ExtractorConfig;
use discover::{default_discoverers, scan_documents, ContentDiscoverer, DocumentSnapshot};
use types::{DiscoveryMetadata, ExtractionOutcome, ExtractionResult};

/// Extraction pipeline phases, in execution order. `Failed` is terminal and
/// reachable only from `Navigating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPhase {
    Idle,
    Navigating,
    Discovering,
    ScanningFallback,
    Deduplicating,
    Scoring,
    Complete,
    Failed,
}

impl ExtractionPhase {
    fn as_str(self) -> &'static str {
        match self {
            ExtractionPhase::Idle => "idle",
            ExtractionPhase::Navigating => "navigating",
            ExtractionPhase::Discovering => "discovering",
            ExtractionPhase::ScanningFallback => "scanning_fallback",
            ExtractionPhase::Deduplicating => "deduplicating",
            ExtractionPhase::Scoring => "scoring",
            ExtractionPhase::Complete => "complete",
            ExtractionPhase::Failed => "failed",
        }
    }
}

struct PhaseTracker {
    workflow_id: String,
    current: ExtractionPhase,
}

impl PhaseTracker {
    fn new(workflow_id: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            current: ExtractionPhase::Idle,
        }
    }

    fn advance(&mut self, next: ExtractionPhase) {
        debug!(
            workflow_id = %self.workflow_id,
            from = self.current.as_str(),
            to = next.as_str(),
            "extraction phase"
        );
        self.current = next;
    }
}

/// Explainer content extractor.
///
/// One instance is shared across extractions; all per-extraction state
/// (page, documents, records) lives on the stack of `extract()`, so
/// concurrent extractions of different workflows share nothing mutable.
pub struct ExplainerExtractor {
    config: ExtractorConfig,
    http: reqwest::Client,
    discoverers: Vec<Box<dyn ContentDiscoverer>>,
}

impl ExplainerExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::browser_setup::USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            http,
            discoverers: default_discoverers(),
        })
    }

    /// Replace the discoverer set. New discovery strategies plug in here
    /// without touching the pipeline.
    pub fn with_discoverers(mut self, discoverers: Vec<Box<dyn ContentDiscoverer>>) -> Self {
        self.discoverers = discoverers;
        self
    }

    /// Run the full extraction for one workflow page.
    ///
    /// Only navigation failure produces `success: false`; everything after
    /// a successful load degrades to a smaller result. Dropping the
    /// returned future mid-flight closes the page via its guard.
    pub async fn extract(
        &self,
        browser: &BrowserWrapper,
        workflow_id: &str,
        url: &str,
    ) -> ExtractionOutcome {
        let started = Instant::now();
        let mut phase = PhaseTracker::new(workflow_id);

        phase.advance(ExtractionPhase::Navigating);
        let guard = match navigate::open_page(
            browser,
            url,
            self.config.timeout_ms,
            self.config.settle_delay_ms,
        )
        .await
        {
            Ok(guard) => guard,
            Err(e) => {
                phase.advance(ExtractionPhase::Failed);
                warn!(workflow_id, url, "navigation failed: {}", e);
                return ExtractionOutcome::failed(workflow_id, started.elapsed().as_secs_f64(), e);
            }
        };

        phase.advance(ExtractionPhase::Discovering);
        let main_html = match guard.page().content().await {
            Ok(html) => html,
            Err(e) => {
                // Page loaded but would not serialize; degrade to an empty
                // main document rather than failing the extraction.
                warn!(workflow_id, "could not serialize main page: {}", e);
                String::new()
            }
        };

        let fetch_timeout = Duration::from_millis(self.config.timeout_ms);
        let walk = iframe::walk_iframes(guard.page(), &self.http, url, fetch_timeout).await;

        let mut documents = vec![DocumentSnapshot::main_page(main_html)];
        documents.extend(walk.documents);

        let discovery = scan_documents(&self.discoverers, &documents);
        let structural_videos = discovery.videos.len();

        phase.advance(ExtractionPhase::ScanningFallback);
        // Sweep the serialized page plus every iframe document we obtained,
        // so late-bound references inside accessible frames are caught too.
        let merged_html = documents
            .iter()
            .map(|d| d.html.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let fallback_videos = fallback::scan_for_videos(&merged_html);
        let fallback_count = fallback_videos.len();

        phase.advance(ExtractionPhase::Deduplicating);
        let mut all_videos = discovery.videos;
        all_videos.extend(fallback_videos);
        let videos = dedup::dedup_videos(all_videos);

        let text_content = discovery
            .texts
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut result = ExtractionResult {
            workflow_id: workflow_id.to_string(),
            videos,
            text_content,
            images: discovery.images,
            code_snippets: discovery.code_snippets,
            quality_score: 0,
            discovery_metadata: DiscoveryMetadata {
                iframes_found: walk.iframes_found,
                videos_discovered: structural_videos,
                text_areas_found: discovery.texts.len(),
                fallback_videos: fallback_count,
            },
            transcripts: Default::default(),
        };

        phase.advance(ExtractionPhase::Scoring);
        result.quality_score = score::quality_score(&result);

        if self.config.extract_transcripts && !result.videos.is_empty() {
            let fetcher = TranscriptFetcher::new(self.http.clone());
            result.transcripts = fetcher.fetch_for_videos(&result.videos).await;
        }

        guard.close().await;
        phase.advance(ExtractionPhase::Complete);

        info!(
            workflow_id,
            videos = result.videos.len(),
            text_chars = result.text_content.len(),
            quality = result.quality_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "explainer extraction complete"
        );

        ExtractionOutcome::from_result(result, started.elapsed().as_secs_f64())
    }
}
