//! In-process property graph.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use wfgraph_model::{EdgeKind, EdgeSpec, NodeLabel, NodeRef, PropertyMap};

use crate::{GraphStore, GraphSummary, StoreError};

type EdgeKey = (EdgeKind, NodeRef, NodeRef);

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<NodeRef, PropertyMap>,
    edges: BTreeMap<EdgeKey, Option<i64>>,
}

/// A [`GraphStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: RwLock<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, node: &NodeRef) -> Option<PropertyMap> {
        self.state.read().nodes.get(node).cloned()
    }

    pub fn contains_node(&self, node: &NodeRef) -> bool {
        self.state.read().nodes.contains_key(node)
    }

    pub fn node_count(&self, label: NodeLabel) -> usize {
        self.state
            .read()
            .nodes
            .keys()
            .filter(|n| n.label == label)
            .count()
    }

    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        self.state
            .read()
            .edges
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }

    /// `None` if the edge does not exist, otherwise its quantity attribute.
    pub fn edge(&self, kind: EdgeKind, from: &NodeRef, to: &NodeRef) -> Option<Option<i64>> {
        self.state
            .read()
            .edges
            .get(&(kind, from.clone(), to.clone()))
            .copied()
    }

    /// Outgoing edges of one kind, as `(target, quantity)`.
    pub fn edges_from(&self, from: &NodeRef, kind: EdgeKind) -> Vec<(NodeRef, Option<i64>)> {
        self.state
            .read()
            .edges
            .iter()
            .filter(|((k, f, _), _)| *k == kind && f == from)
            .map(|((_, _, to), quantity)| (to.clone(), *quantity))
            .collect()
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.state.read();
        GraphSnapshot {
            nodes: state
                .nodes
                .iter()
                .map(|(node, properties)| SnapshotNode {
                    node: node.clone(),
                    properties: properties.clone(),
                })
                .collect(),
            edges: state
                .edges
                .iter()
                .map(|((kind, from, to), quantity)| SnapshotEdge {
                    kind: *kind,
                    from: from.clone(),
                    to: to.clone(),
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut state = State::default();
        for n in snapshot.nodes {
            state.nodes.insert(n.node, n.properties);
        }
        for e in snapshot.edges {
            state.edges.insert((e.kind, e.from, e.to), e.quantity);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Write the graph as pretty-printed JSON.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Snapshot {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_vec_pretty(&self.snapshot()).map_err(|e| io_err(e.into()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, json).map_err(io_err)
    }

    pub fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        let io_err = |source: std::io::Error| StoreError::Snapshot {
            path: path.to_path_buf(),
            source,
        };
        let bytes = std::fs::read(path).map_err(io_err)?;
        let snapshot: GraphSnapshot = serde_json::from_slice(&bytes).map_err(|e| io_err(e.into()))?;
        Ok(Self::from_snapshot(snapshot))
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn upsert_node(&self, node: &NodeRef, properties: &PropertyMap) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let existing = state.nodes.entry(node.clone()).or_default();
        for (key, value) in properties {
            existing.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn merge_edge(&self, edge: &EdgeSpec) -> Result<bool, StoreError> {
        let mut state = self.state.write();
        if !state.nodes.contains_key(&edge.from) || !state.nodes.contains_key(&edge.to) {
            return Ok(false);
        }
        let quantity = if edge.kind.carries_quantity() {
            edge.quantity
        } else {
            None
        };
        state
            .edges
            .insert((edge.kind, edge.from.clone(), edge.to.clone()), quantity);
        Ok(true)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.nodes.clear();
        state.edges.clear();
        Ok(())
    }

    async fn summary(&self) -> Result<GraphSummary, StoreError> {
        let state = self.state.read();
        let mut summary = GraphSummary::default();
        for node in state.nodes.keys() {
            *summary.nodes.entry(node.label.as_str().to_string()).or_default() += 1;
        }
        for (kind, _, _) in state.edges.keys() {
            *summary.edges.entry(kind.as_str().to_string()).or_default() += 1;
        }
        Ok(summary)
    }
}

// ============================================================================
// Snapshot format
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(flatten)]
    pub node: NodeRef,
    #[serde(default)]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub kind: EdgeKind,
    pub from: NodeRef,
    pub to: NodeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}
