//! Persistence port and the JSON-lines reference store
//!
//! The relational store that holds harvest results lives outside this crate;
//! `WorkflowStore` is the seam it implements. The row shape mirrors that
//! store's layout — per-layer success flag, timestamp, duration, and JSON
//! blob — without this crate knowing anything about SQL or connections.
//! `JsonlStore` is the bundled file-backed implementation used by the
//! binary and by tests.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// One workflow's harvest state across all three layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRow {
    pub workflow_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub layer1_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer1_extracted_at: Option<DateTime<Utc>>,
    pub layer1_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer1_json: Option<Value>,

    pub layer2_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer2_extracted_at: Option<DateTime<Utc>>,
    pub layer2_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer2_json: Option<Value>,

    pub layer3_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer3_extracted_at: Option<DateTime<Utc>>,
    pub layer3_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer3_json: Option<Value>,

    /// Derived from layer 3 content; recomputed every harvest, never
    /// hand-edited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<u8>,
}

impl WorkflowRow {
    pub fn new(workflow_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            url: url.into(),
            title: None,
            layer1_success: false,
            layer1_extracted_at: None,
            layer1_seconds: 0.0,
            layer1_json: None,
            layer2_success: false,
            layer2_extracted_at: None,
            layer2_seconds: 0.0,
            layer2_json: None,
            layer3_success: false,
            layer3_extracted_at: None,
            layer3_seconds: 0.0,
            layer3_json: None,
            quality_score: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("row serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Port implemented by whatever actually persists harvest results.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn upsert_workflow(&self, row: &WorkflowRow) -> Result<(), StoreError>;
}

/// Append-only JSON-lines store. The latest line for a workflow id is the
/// current row; compaction is a downstream concern.
pub struct JsonlStore {
    file: Mutex<tokio::fs::File>,
}

impl JsonlStore {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl WorkflowStore for JsonlStore {
    async fn upsert_workflow(&self, row: &WorkflowRow) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(row)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(workflow_id = %row.workflow_id, "workflow row persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rows_round_trip_through_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        let store = JsonlStore::create(&path).await.unwrap();

        let mut row = WorkflowRow::new("2462", "https://n8n.io/workflows/2462-demo");
        row.layer2_success = true;
        row.layer2_extracted_at = Some(Utc::now());
        row.quality_score = Some(70);
        store.upsert_workflow(&row).await.unwrap();

        let second = WorkflowRow::new("7639", "https://n8n.io/workflows/7639-other");
        store.upsert_workflow(&second).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: WorkflowRow = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.workflow_id, "2462");
        assert!(parsed.layer2_success);
        assert_eq!(parsed.quality_score, Some(70));

        let parsed: WorkflowRow = serde_json::from_str(lines[1]).unwrap();
        assert!(!parsed.layer1_success);
        assert_eq!(parsed.quality_score, None);
    }
}
