//! Harvester for the n8n.io workflow template gallery
//!
//! Discovers workflow pages from the gallery sitemap, then extracts three
//! layers per workflow: page metadata, the workflow graph JSON from the
//! template API, and explainer/tutorial content via a headless-browser
//! content-discovery pipeline (videos, text, images, code).

pub mod browser;
pub mod browser_setup;
pub mod extractor;
pub mod inventory;
pub mod layers;
pub mod orchestrator;
pub mod storage;
pub mod transcript;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Explainer extraction options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Run the browser without a visible UI.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Maximum navigation wait per page load.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Fixed wait after the load lifecycle, giving client-side rendering
    /// time to populate the explainer panel.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Attempt per-video transcript extraction. Considerably slower; off
    /// by default.
    #[serde(default)]
    pub extract_transcripts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Concurrent extractions. Each holds an open browser page, so this is
    /// bounded by browser memory, not CPU.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Minimum spacing between navigations to the target site.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Navigation retry attempts per layer (the extraction core itself
    /// never retries).
    #[serde(default = "default_max_nav_retries")]
    pub max_nav_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON-lines results file written by the bundled store.
    #[serde(default = "default_jsonl_path")]
    pub jsonl_path: String,
}

fn default_headless() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_settle_delay_ms() -> u64 {
    3_000
}

fn default_max_concurrent() -> usize {
    3
}

fn default_min_request_interval_ms() -> u64 {
    1_500
}

fn default_max_nav_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    2_000
}

fn default_jsonl_path() -> String {
    "harvest_results.jsonl".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            timeout_ms: default_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            extract_transcripts: false,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            min_request_interval_ms: default_min_request_interval_ms(),
            max_nav_retries: default_max_nav_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            jsonl_path: default_jsonl_path(),
        }
    }
}

/// Load config from config.yaml in the package root, falling back to
/// defaults when the file is absent.
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml");

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

pub use browser::{BrowserError, BrowserWrapper, PageGuard};
pub use extractor::types::{ExtractionOutcome, ExtractionResult};
pub use extractor::ExplainerExtractor;
pub use inventory::{InventoryCrawler, WorkflowRef};
pub use orchestrator::{Harvester, RunSummary};
pub use storage::{JsonlStore, WorkflowRow, WorkflowStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.extractor.headless);
        assert_eq!(config.extractor.timeout_ms, 30_000);
        assert_eq!(config.extractor.settle_delay_ms, 3_000);
        assert!(!config.extractor.extract_transcripts);
        assert_eq!(config.orchestrator.max_concurrent, 3);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let yaml = "extractor:\n  headless: false\n  timeout_ms: 60000\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.extractor.headless);
        assert_eq!(config.extractor.timeout_ms, 60_000);
        // Untouched sections keep defaults.
        assert_eq!(config.extractor.settle_delay_ms, 3_000);
        assert_eq!(config.storage.jsonl_path, "harvest_results.jsonl");
    }
}
