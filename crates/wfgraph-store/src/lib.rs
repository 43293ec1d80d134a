//! wfgraph graph store
//!
//! The ingestion core only ever talks to a [`GraphStore`]: keyed node
//! upserts, keyed edge merges, a destructive clear and a count summary.
//!
//! - [`Neo4jStore`]: parameterized Cypher over Bolt
//! - [`MemoryGraph`]: in-process property graph with the same semantics,
//!   used for dry runs and tests
//!
//! Both implementations share the write contract:
//! - `upsert_node` merges by natural key and overlays properties (`SET n += $props`),
//!   so re-applying identical input leaves identical state.
//! - `merge_edge` only connects nodes that already exist, never duplicates an
//!   edge key, and overwrites `quantity` instead of accumulating it.

pub mod memory;
pub mod neo4j;

pub use memory::{GraphSnapshot, MemoryGraph};
pub use neo4j::{Neo4jConfig, Neo4jStore, ServerComponent};

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wfgraph_model::{EdgeSpec, NodeRef, PropertyMap};

// ============================================================================
// Store trait
// ============================================================================

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create or update the node identified by `node`, overlaying `properties`.
    async fn upsert_node(&self, node: &NodeRef, properties: &PropertyMap) -> Result<(), StoreError>;

    /// Merge an edge between two existing nodes.
    ///
    /// Returns `false`, without writing anything, when either endpoint is
    /// missing.
    async fn merge_edge(&self, edge: &EdgeSpec) -> Result<bool, StoreError>;

    /// Remove every node and edge.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Node counts by label and edge counts by type.
    async fn summary(&self) -> Result<GraphSummary, StoreError>;
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: BTreeMap<String, u64>,
    pub edges: BTreeMap<String, u64>,
}

impl GraphSummary {
    pub fn node_count(&self, label: &str) -> u64 {
        self.nodes.get(label).copied().unwrap_or(0)
    }

    pub fn edge_count(&self, kind: &str) -> u64 {
        self.edges.get(kind).copied().unwrap_or(0)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store configuration: {0}")]
    Config(String),

    #[error("failed to connect to {uri}: {source}")]
    Connect {
        uri: String,
        #[source]
        source: neo4rs::Error,
    },

    #[error("query failed: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("unexpected query result: {0}")]
    Result(String),

    #[error("snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
