//! Harvest pipeline across many workflows
//!
//! Drives each workflow through the three extraction layers under a bounded
//! worker pool. Retry policy lives here and only here — the extraction core
//! never retries — and one workflow's failure never aborts the run. Each
//! extraction owns an exclusive browser page for its lifetime; the only
//! shared things are the browser process itself and the store behind its
//! port, both designed for concurrent use.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::BrowserWrapper;
use crate::extractor::navigate::{self, NavigationError};
use crate::extractor::ExplainerExtractor;
use crate::inventory::WorkflowRef;
use crate::layers::metadata::{extract_metadata, PageMetadata};
use crate::layers::GraphClient;
use crate::storage::{WorkflowRow, WorkflowStore};
use crate::Config;

/// Minimum spacing between navigations to the target site. Serializes
/// waiters; concurrency buys overlap of browser work, not request bursts.
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Exponential-backoff retry for operations the orchestrator owns.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(what, attempt, delay_ms = delay.as_millis() as u64, "attempt failed, retrying: {}", e);
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Aggregate result of a harvest run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub layer1_ok: usize,
    pub layer2_ok: usize,
    pub layer3_ok: usize,
    pub store_failures: usize,
    pub mean_quality: f64,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Default)]
struct WorkflowTally {
    layer1_ok: bool,
    layer2_ok: bool,
    layer3_ok: bool,
    quality: Option<u8>,
    store_failed: bool,
}

pub struct Harvester {
    browser: BrowserWrapper,
    extractor: ExplainerExtractor,
    graph: GraphClient,
    store: Arc<dyn WorkflowStore>,
    rate: RateLimiter,
    retry: RetryPolicy,
    max_concurrent: usize,
    timeout_ms: u64,
    settle_delay_ms: u64,
}

impl Harvester {
    pub fn new(
        browser: BrowserWrapper,
        config: &Config,
        store: Arc<dyn WorkflowStore>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::browser_setup::USER_AGENT)
            .build()?;
        Ok(Self {
            browser,
            extractor: ExplainerExtractor::new(config.extractor.clone())?,
            graph: GraphClient::new(http),
            store,
            rate: RateLimiter::new(Duration::from_millis(
                config.orchestrator.min_request_interval_ms,
            )),
            retry: RetryPolicy {
                max_attempts: config.orchestrator.max_nav_retries.max(1),
                base_delay: Duration::from_millis(config.orchestrator.retry_base_delay_ms),
            },
            max_concurrent: config.orchestrator.max_concurrent.max(1),
            timeout_ms: config.extractor.timeout_ms,
            settle_delay_ms: config.extractor.settle_delay_ms,
        })
    }

    /// Run the full pipeline over the given workflows.
    pub async fn run(&self, workflows: &[WorkflowRef]) -> RunSummary {
        let started = Instant::now();
        info!(
            workflows = workflows.len(),
            concurrency = self.max_concurrent,
            "starting harvest run"
        );

        let tallies: Vec<WorkflowTally> = futures::stream::iter(workflows)
            .map(|wf| self.process_one(wf))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let summary = summarize(&tallies, started.elapsed().as_secs_f64());
        info!(
            total = summary.total,
            layer1_ok = summary.layer1_ok,
            layer2_ok = summary.layer2_ok,
            layer3_ok = summary.layer3_ok,
            store_failures = summary.store_failures,
            mean_quality = summary.mean_quality,
            elapsed_seconds = summary.elapsed_seconds,
            "harvest run complete"
        );
        summary
    }

    /// Close the browser and release its profile directory.
    pub async fn shutdown(self) -> Result<()> {
        self.browser.shutdown().await
    }

    async fn process_one(&self, wf: &WorkflowRef) -> WorkflowTally {
        let mut row = WorkflowRow::new(&wf.workflow_id, &wf.url);
        row.title = Some(wf.title.clone());
        let mut tally = WorkflowTally::default();

        // Layer 2 first: a plain API call, no browser involvement.
        let started = Instant::now();
        match self.graph.fetch(&wf.workflow_id).await {
            Ok(graph) => {
                row.layer2_success = true;
                row.layer2_extracted_at = Some(Utc::now());
                row.layer2_json = Some(json!({
                    "node_count": graph.node_count,
                    "connection_count": graph.connection_count,
                    "node_types": graph.node_types,
                    "template": graph.raw,
                }));
                tally.layer2_ok = true;
            }
            Err(e) => {
                warn!(workflow_id = %wf.workflow_id, "layer 2 failed: {}", e);
            }
        }
        row.layer2_seconds = started.elapsed().as_secs_f64();

        // Layer 1: one navigation, retried on navigation failure.
        let started = Instant::now();
        match self
            .retry
            .run("layer1", || self.extract_page_metadata(wf))
            .await
        {
            Ok(meta) if !meta.is_empty() => {
                row.layer1_success = true;
                row.layer1_extracted_at = Some(Utc::now());
                row.layer1_json = serde_json::to_value(&meta).ok();
                tally.layer1_ok = true;
            }
            Ok(_) => {
                debug!(workflow_id = %wf.workflow_id, "layer 1 extracted nothing");
            }
            Err(e) => {
                warn!(workflow_id = %wf.workflow_id, "layer 1 failed: {}", e);
            }
        }
        row.layer1_seconds = started.elapsed().as_secs_f64();

        // Layer 3: the explainer pipeline. The extractor reports failure
        // only when navigation failed, so that is the retry condition.
        let started = Instant::now();
        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            self.rate.acquire().await;
            let outcome = self
                .extractor
                .extract(&self.browser, &wf.workflow_id, &wf.url)
                .await;
            if outcome.success || attempt >= self.retry.max_attempts {
                break outcome;
            }
            let delay = self.retry.backoff(attempt);
            warn!(
                workflow_id = %wf.workflow_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "layer 3 navigation failed, retrying"
            );
            sleep(delay).await;
        };

        row.layer3_success = outcome.success;
        row.layer3_seconds = started.elapsed().as_secs_f64();
        if outcome.success {
            row.layer3_extracted_at = Some(Utc::now());
            row.quality_score = Some(outcome.quality_score);
            tally.layer3_ok = true;
            tally.quality = Some(outcome.quality_score);
        }
        row.layer3_json = serde_json::to_value(&outcome).ok();

        // Persist, with one extra attempt; a write failure is surfaced in
        // the summary, never silently dropped.
        let mut stored = false;
        for attempt in 1..=2 {
            match self.store.upsert_workflow(&row).await {
                Ok(()) => {
                    stored = true;
                    break;
                }
                Err(e) => {
                    error!(workflow_id = %wf.workflow_id, attempt, "persistence failed: {}", e);
                    if attempt == 1 {
                        sleep(self.retry.base_delay).await;
                    }
                }
            }
        }
        tally.store_failed = !stored;

        tally
    }

    async fn extract_page_metadata(&self, wf: &WorkflowRef) -> Result<PageMetadata, NavigationError> {
        self.rate.acquire().await;
        let guard = navigate::open_page(&self.browser, &wf.url, self.timeout_ms, self.settle_delay_ms).await?;
        let html = match guard.page().content().await {
            Ok(html) => html,
            Err(e) => {
                warn!(workflow_id = %wf.workflow_id, "could not serialize page for metadata: {}", e);
                String::new()
            }
        };
        guard.close().await;
        Ok(extract_metadata(&html))
    }
}

fn summarize(tallies: &[WorkflowTally], elapsed_seconds: f64) -> RunSummary {
    let qualities: Vec<u8> = tallies.iter().filter_map(|t| t.quality).collect();
    let mean_quality = if qualities.is_empty() {
        0.0
    } else {
        qualities.iter().map(|q| f64::from(*q)).sum::<f64>() / qualities.len() as f64
    };

    RunSummary {
        total: tallies.len(),
        layer1_ok: tallies.iter().filter(|t| t.layer1_ok).count(),
        layer2_ok: tallies.iter().filter(|t| t.layer2_ok).count(),
        layer3_ok: tallies.iter().filter(|t| t.layer3_ok).count(),
        store_failures: tallies.iter().filter(|t| t.store_failed).count(),
        mean_quality,
        elapsed_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn rate_limiter_spaces_acquisitions() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let started = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn retry_policy_stops_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = policy
            .run("always-fails", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("nope".to_string()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_policy_returns_first_success() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = policy
            .run("flaky", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err("transient".to_string())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn summary_counts_layers_and_averages_quality() {
        let tallies = vec![
            WorkflowTally {
                layer1_ok: true,
                layer2_ok: true,
                layer3_ok: true,
                quality: Some(80),
                store_failed: false,
            },
            WorkflowTally {
                layer1_ok: false,
                layer2_ok: true,
                layer3_ok: true,
                quality: Some(40),
                store_failed: false,
            },
            WorkflowTally {
                layer1_ok: false,
                layer2_ok: false,
                layer3_ok: false,
                quality: None,
                store_failed: true,
            },
        ];
        let summary = summarize(&tallies, 12.5);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.layer1_ok, 1);
        assert_eq!(summary.layer2_ok, 2);
        assert_eq!(summary.layer3_ok, 2);
        assert_eq!(summary.store_failures, 1);
        assert!((summary.mean_quality - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_run_has_zero_mean_quality() {
        let summary = summarize(&[], 0.1);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.mean_quality, 0.0);
    }
}
