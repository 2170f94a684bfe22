//! Per-layer extraction passes
//!
//! Three independent passes populate a workflow row: page metadata (layer 1),
//! the workflow graph JSON from the template API (layer 2), and explainer
//! content via the browser pipeline (layer 3, in `crate::extractor`). A
//! layer succeeds only when it produced a non-empty structured result.

pub mod graph;
pub mod metadata;

pub use graph::{GraphClient, GraphError, WorkflowGraph};
pub use metadata::{extract_metadata, PageMetadata};
