//! Layer 2: workflow graph JSON from the template API
//!
//! The gallery exposes every template's graph at a stable JSON endpoint, so
//! this layer never touches the browser. The response is validated for the
//! expected shape — an empty or malformed graph is a layer failure, not a
//! success with an empty blob.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const GRAPH_API_BASE: &str = "https://api.n8n.io/api/workflows/templates";

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("graph request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("workflow {0} not found in template API")]
    NotFound(String),

    #[error("workflow {workflow_id} graph has invalid shape: {reason}")]
    InvalidShape { workflow_id: String, reason: String },
}

/// Validated workflow graph: counts for the row, node type names for
/// downstream analysis, and the raw blob for persistence.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    pub node_count: usize,
    pub connection_count: usize,
    pub node_types: Vec<String>,
    pub raw: Value,
}

pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
}

impl GraphClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: GRAPH_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Fetch and validate the graph for one workflow id.
    pub async fn fetch(&self, workflow_id: &str) -> Result<WorkflowGraph, GraphError> {
        let url = format!("{}/{}", self.base_url, workflow_id);
        debug!(workflow_id, url = %url, "fetching workflow graph");

        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GraphError::NotFound(workflow_id.to_string()));
        }
        let body: Value = response.error_for_status()?.json().await?;

        validate_graph(workflow_id, body)
    }
}

/// Validate the template API response shape and derive the graph summary.
///
/// Accepts both response layouts the API has used: the graph nested under
/// `workflow`, and the graph at the root.
pub fn validate_graph(workflow_id: &str, body: Value) -> Result<WorkflowGraph, GraphError> {
    let invalid = |reason: &str| GraphError::InvalidShape {
        workflow_id: workflow_id.to_string(),
        reason: reason.to_string(),
    };

    let graph = if body.get("workflow").map(Value::is_object).unwrap_or(false) {
        &body["workflow"]
    } else {
        &body
    };

    let nodes = graph
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing nodes array"))?;
    if nodes.is_empty() {
        return Err(invalid("nodes array is empty"));
    }

    let node_types: Vec<String> = nodes
        .iter()
        .filter_map(|n| n.get("type").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    let connection_count = graph
        .get("connections")
        .and_then(Value::as_object)
        .map(|c| c.len())
        .unwrap_or(0);

    Ok(WorkflowGraph {
        node_count: nodes.len(),
        connection_count,
        node_types,
        raw: body,
    })
}
