//! Node entity and its detached factory value.
//!
//! A [`NodeDraft`] is what callers build: payload and metadata, no identity,
//! no graph association. A [`Node`] is the live, id-bearing entity the store
//! creates from a draft on insertion. Adjacency bookkeeping lives on the
//! node: per-neighbor edge-id lists for both directions, degree counters,
//! and (when the owning graph allows undirected edges) a per-neighbor count
//! of incident undirected edges for O(1) symmetric existence checks.

use crate::property::{matches_query, PropertyMap};
use crate::types::{EdgeId, NodeId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Resolves "a node or its id" to a raw [`NodeId`].
///
/// Implemented for raw ids, bare `u64`s, and live node references, so every
/// store operation accepting an endpoint or target takes any of them.
pub trait NodeRef {
    fn node_id(&self) -> NodeId;
}

impl NodeRef for NodeId {
    fn node_id(&self) -> NodeId {
        *self
    }
}

impl NodeRef for u64 {
    fn node_id(&self) -> NodeId {
        NodeId(*self)
    }
}

impl NodeRef for &Node {
    fn node_id(&self) -> NodeId {
        self.id
    }
}

/// A detached node value produced by the factory: no id, zero degree, empty
/// adjacency. Becomes live only when passed to `Graph::add_node`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDraft {
    pub payload: PropertyMap,
    pub metadata: PropertyMap,
}

impl NodeDraft {
    pub fn new(payload: PropertyMap, metadata: PropertyMap) -> Self {
        NodeDraft { payload, metadata }
    }

    /// Draft with empty payload and metadata.
    pub fn empty() -> Self {
        NodeDraft::default()
    }
}

/// A live node in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier, assigned on insertion, immutable thereafter.
    pub id: NodeId,

    /// Caller-defined data; the only thing queries match against.
    pub payload: PropertyMap,

    /// Caller-defined data; never matched by queries.
    pub metadata: PropertyMap,

    /// Neighbor id -> ordered list of edge ids directed from this node to
    /// that neighbor.
    pub(crate) outbound: IndexMap<NodeId, Vec<EdgeId>>,

    /// Neighbor id -> ordered list of edge ids directed from that neighbor
    /// to this node.
    pub(crate) inbound: IndexMap<NodeId, Vec<EdgeId>>,

    /// Live count of outbound edges.
    pub num_outbound: usize,

    /// Live count of inbound edges.
    pub num_inbound: usize,

    /// Neighbor id -> live count of undirected edges incident between the
    /// two nodes. Only populated when the owning graph allows undirected
    /// edges.
    pub(crate) undirected_refs: IndexMap<NodeId, u64>,
}

impl Node {
    pub(crate) fn from_draft(id: NodeId, draft: NodeDraft) -> Self {
        Node {
            id,
            payload: draft.payload,
            metadata: draft.metadata,
            outbound: IndexMap::new(),
            inbound: IndexMap::new(),
            num_outbound: 0,
            num_inbound: 0,
            undirected_refs: IndexMap::new(),
        }
    }

    /// Outbound adjacency: neighbor id -> edge ids from this node.
    pub fn outbound(&self) -> &IndexMap<NodeId, Vec<EdgeId>> {
        &self.outbound
    }

    /// Inbound adjacency: neighbor id -> edge ids reaching this node.
    pub fn inbound(&self) -> &IndexMap<NodeId, Vec<EdgeId>> {
        &self.inbound
    }

    /// Live count of undirected edges between this node and `neighbor`.
    pub fn undirected_count(&self, neighbor: NodeId) -> u64 {
        self.undirected_refs.get(&neighbor).copied().unwrap_or(0)
    }

    /// Partial payload match against `query`.
    pub fn matches(&self, query: &PropertyMap) -> bool {
        matches_query(&self.payload, query)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
