//! Edge entity and its detached factory value.
//!
//! Endpoints are resolved to raw ids at construction time, so a stored edge
//! never holds a live object reference. Whether the endpoints actually exist
//! is checked at insertion time by the store, not here.

use crate::node::NodeRef;
use crate::property::{matches_query, PropertyMap};
use crate::types::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};

/// Resolves "an edge or its id" to a raw [`EdgeId`].
pub trait EdgeRef {
    fn edge_id(&self) -> EdgeId;
}

impl EdgeRef for EdgeId {
    fn edge_id(&self) -> EdgeId {
        *self
    }
}

impl EdgeRef for u64 {
    fn edge_id(&self) -> EdgeId {
        EdgeId(*self)
    }
}

impl EdgeRef for &Edge {
    fn edge_id(&self) -> EdgeId {
        self.id
    }
}

/// A detached edge value: endpoints as raw ids, no identity yet.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeDraft {
    pub from: NodeId,
    pub to: NodeId,
    pub directed: bool,
    pub payload: PropertyMap,
    pub metadata: PropertyMap,
}

impl EdgeDraft {
    /// Directed edge draft from `from` to `to`.
    pub fn new(
        from: impl NodeRef,
        to: impl NodeRef,
        payload: PropertyMap,
        metadata: PropertyMap,
    ) -> Self {
        EdgeDraft {
            from: from.node_id(),
            to: to.node_id(),
            directed: true,
            payload,
            metadata,
        }
    }

    /// Undirected edge draft between `from` and `to`. The nominal
    /// orientation is still stored, but the store treats the edge as
    /// incident to both endpoints symmetrically.
    pub fn undirected(
        from: impl NodeRef,
        to: impl NodeRef,
        payload: PropertyMap,
        metadata: PropertyMap,
    ) -> Self {
        EdgeDraft {
            directed: false,
            ..EdgeDraft::new(from, to, payload, metadata)
        }
    }
}

/// A live edge in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier, assigned on insertion.
    pub id: EdgeId,

    /// Source endpoint (nominal, for undirected edges).
    pub from: NodeId,

    /// Target endpoint (nominal, for undirected edges).
    pub to: NodeId,

    /// Whether the edge is meaningful only from `from` to `to`.
    pub directed: bool,

    /// Caller-defined data; the only thing queries match against.
    pub payload: PropertyMap,

    /// Caller-defined data; never matched by queries.
    pub metadata: PropertyMap,
}

impl Edge {
    pub(crate) fn from_draft(id: EdgeId, draft: EdgeDraft) -> Self {
        Edge {
            id,
            from: draft.from,
            to: draft.to,
            directed: draft.directed,
            payload: draft.payload,
            metadata: draft.metadata,
        }
    }

    /// Partial payload match against `query`.
    pub fn matches(&self, query: &PropertyMap) -> bool {
        matches_query(&self.payload, query)
    }

    /// The endpoint of this edge that is not `node`. For a self-loop this is
    /// the node itself.
    pub fn far_end(&self, node: NodeId) -> NodeId {
        if self.from == node {
            self.to
        } else {
            self.from
        }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Edge {}

impl std::hash::Hash for Edge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
