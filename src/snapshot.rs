//! JSON snapshot persistence.
//!
//! A snapshot is a plain-data capture of the live tables, adjacency
//! included, so restoring is a load rather than a replay of mutations.
//! Restored graphs reseed their id sequences past the highest live id,
//! keeping ids collision-free across a save/load cycle even when the saved
//! graph had removal gaps.

use crate::edge::Edge;
use crate::node::Node;
use crate::sequence::IdSequence;
use crate::store::{Graph, GraphOptions};
use crate::types::{EdgeId, NodeId};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised while restoring a snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}

/// Plain-data capture of a graph's live state.
///
/// Counts are stored redundantly and cross-checked on restore, so a
/// truncated or hand-edited document is rejected instead of silently
/// loading short.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes: IndexMap<NodeId, Node>,
    pub edges: IndexMap<EdgeId, Edge>,
}

impl Graph {
    /// Capture the live tables as a detached snapshot value.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Restore a graph from a snapshot, under fresh `options`.
    ///
    /// The observer is not part of a snapshot; pass one in `options` if the
    /// restored graph should report mutations. No events fire for the
    /// restored entities themselves.
    pub fn from_snapshot(
        snapshot: GraphSnapshot,
        options: GraphOptions,
    ) -> Result<Graph, SnapshotError> {
        if snapshot.node_count != snapshot.nodes.len() {
            return Err(SnapshotError::Inconsistent(format!(
                "node count {} does not match {} stored nodes",
                snapshot.node_count,
                snapshot.nodes.len()
            )));
        }
        if snapshot.edge_count != snapshot.edges.len() {
            return Err(SnapshotError::Inconsistent(format!(
                "edge count {} does not match {} stored edges",
                snapshot.edge_count,
                snapshot.edges.len()
            )));
        }
        for (id, node) in &snapshot.nodes {
            if *id != node.id {
                return Err(SnapshotError::Inconsistent(format!(
                    "node stored under key {} carries id {}",
                    id, node.id
                )));
            }
        }
        // Adjacency and degree state travels in the document; cross-check
        // every edge against it so a snapshot whose tables disagree is
        // rejected here instead of corrupting counters on a later removal.
        let mut out_counts: FxHashMap<NodeId, usize> = FxHashMap::default();
        let mut in_counts: FxHashMap<NodeId, usize> = FxHashMap::default();
        for (id, edge) in &snapshot.edges {
            if *id != edge.id {
                return Err(SnapshotError::Inconsistent(format!(
                    "edge stored under key {} carries id {}",
                    id, edge.id
                )));
            }
            if !snapshot.nodes.contains_key(&edge.from) {
                return Err(SnapshotError::Inconsistent(format!(
                    "edge {} references missing source node {}",
                    id, edge.from
                )));
            }
            if !snapshot.nodes.contains_key(&edge.to) {
                return Err(SnapshotError::Inconsistent(format!(
                    "edge {} references missing target node {}",
                    id, edge.to
                )));
            }
            let listed = snapshot.nodes[&edge.from]
                .outbound
                .get(&edge.to)
                .map_or(false, |list| list.contains(id));
            if !listed {
                return Err(SnapshotError::Inconsistent(format!(
                    "edge {} is not listed in the outbound adjacency of node {}",
                    id, edge.from
                )));
            }
            let listed = snapshot.nodes[&edge.to]
                .inbound
                .get(&edge.from)
                .map_or(false, |list| list.contains(id));
            if !listed {
                return Err(SnapshotError::Inconsistent(format!(
                    "edge {} is not listed in the inbound adjacency of node {}",
                    id, edge.to
                )));
            }
            *out_counts.entry(edge.from).or_default() += 1;
            *in_counts.entry(edge.to).or_default() += 1;
        }
        for (id, node) in &snapshot.nodes {
            for (neighbor, list) in &node.outbound {
                for edge_id in list {
                    let edge = snapshot.edges.get(edge_id).ok_or_else(|| {
                        SnapshotError::Inconsistent(format!(
                            "adjacency of node {} lists dead edge {}",
                            id, edge_id
                        ))
                    })?;
                    if edge.from != *id || edge.to != *neighbor {
                        return Err(SnapshotError::Inconsistent(format!(
                            "edge {} is misfiled in the outbound adjacency of node {}",
                            edge_id, id
                        )));
                    }
                }
            }
            for (neighbor, list) in &node.inbound {
                for edge_id in list {
                    let edge = snapshot.edges.get(edge_id).ok_or_else(|| {
                        SnapshotError::Inconsistent(format!(
                            "adjacency of node {} lists dead edge {}",
                            id, edge_id
                        ))
                    })?;
                    if edge.to != *id || edge.from != *neighbor {
                        return Err(SnapshotError::Inconsistent(format!(
                            "edge {} is misfiled in the inbound adjacency of node {}",
                            edge_id, id
                        )));
                    }
                }
            }

            let expected_out = out_counts.get(id).copied().unwrap_or(0);
            let listed_out: usize = node.outbound.values().map(Vec::len).sum();
            if node.num_outbound != expected_out || listed_out != expected_out {
                return Err(SnapshotError::Inconsistent(format!(
                    "node {} records {} outbound edges ({} listed) but the edge table has {}",
                    id, node.num_outbound, listed_out, expected_out
                )));
            }
            let expected_in = in_counts.get(id).copied().unwrap_or(0);
            let listed_in: usize = node.inbound.values().map(Vec::len).sum();
            if node.num_inbound != expected_in || listed_in != expected_in {
                return Err(SnapshotError::Inconsistent(format!(
                    "node {} records {} inbound edges ({} listed) but the edge table has {}",
                    id, node.num_inbound, listed_in, expected_in
                )));
            }
        }

        // Reseed past the highest live id. Pre-removal gaps are lost, which
        // is fine; ids only ever need to stay unique, not contiguous.
        let node_seed = snapshot.nodes.keys().map(|id| id.as_u64() + 1).max().unwrap_or(0);
        let edge_seed = snapshot.edges.keys().map(|id| id.as_u64() + 1).max().unwrap_or(0);

        debug!(
            "restored snapshot: {} nodes, {} edges",
            snapshot.node_count, snapshot.edge_count
        );
        Ok(Graph {
            nodes: snapshot.nodes,
            edges: snapshot.edges,
            node_seq: IdSequence::starting_at(node_seed),
            edge_seq: IdSequence::starting_at(edge_seed),
            options,
        })
    }

    /// Serialize the graph to a JSON snapshot document.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Restore a graph from a JSON snapshot document.
    pub fn from_json(json: &str, options: GraphOptions) -> Result<Graph, SnapshotError> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)?;
        Graph::from_snapshot(snapshot, options)
    }
}
