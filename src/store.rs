//! In-memory graph store.
//!
//! Owns the node and edge tables, the per-node adjacency indices, and both
//! query surfaces: eager operations returning materialized `Vec`s and lazy
//! `_iter` counterparts built from the combinators in [`crate::iter`]. The
//! two paths share candidate pools and predicates, so draining a lazy
//! iterator always yields exactly the eager result, in the same order.
//!
//! Single-writer model: no internal locking, mutation and queries run to
//! completion, and lazy iterators suspend only between pulls.

use crate::edge::{Edge, EdgeDraft, EdgeRef};
use crate::event::{GraphEvent, Observer};
use crate::iter::{mapped, matching, union, yield_all};
use crate::node::{Node, NodeDraft, NodeRef};
use crate::property::PropertyMap;
use crate::sequence::IdSequence;
use crate::types::{EdgeId, NodeId};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during graph mutation.
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("invalid edge: source node {0} does not exist")]
    InvalidEdgeSource(NodeId),

    #[error("invalid edge: target node {0} does not exist")]
    InvalidEdgeTarget(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Configuration fixed at graph construction.
#[derive(Default)]
pub struct GraphOptions {
    /// Whether undirected edges are permitted. When false, `link` forces
    /// directed edges and undirected existence checks always fail.
    pub allow_undirected: bool,

    /// Optional mutation observer, invoked synchronously with each change.
    pub observer: Option<Observer>,
}

impl GraphOptions {
    pub fn new() -> Self {
        GraphOptions::default()
    }

    pub fn allow_undirected(mut self, allow: bool) -> Self {
        self.allow_undirected = allow;
        self
    }

    pub fn observer(mut self, observer: impl Fn(GraphEvent<'_>) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }
}

/// An in-memory, mutable property graph.
///
/// Tables are insertion-ordered, so full scans enumerate entities in the
/// order they were added (stable for a given mutation history). Ids are
/// assigned by private monotonic sequences and never reused, even after
/// removal.
pub struct Graph {
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) edges: IndexMap<EdgeId, Edge>,
    pub(crate) node_seq: IdSequence,
    pub(crate) edge_seq: IdSequence,
    pub(crate) options: GraphOptions,
}

impl Graph {
    /// Empty graph with default options (directed edges only, no observer).
    pub fn new() -> Self {
        Graph::with_options(GraphOptions::default())
    }

    pub fn with_options(options: GraphOptions) -> Self {
        Graph {
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            node_seq: IdSequence::new(),
            edge_seq: IdSequence::new(),
            options,
        }
    }

    pub fn allows_undirected(&self) -> bool {
        self.options.allow_undirected
    }

    /// Number of live nodes. Independent of the id high-water mark, which
    /// never decreases.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn emit(&self, event: GraphEvent<'_>) {
        if let Some(observer) = &self.options.observer {
            observer(event);
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Add a node built from `draft`. Assigns the next node id, stores the
    /// node, and fires [`GraphEvent::NodeAdded`]. Infallible.
    pub fn add_node(&mut self, draft: NodeDraft) -> NodeId {
        let id = NodeId::new(self.node_seq.next());
        self.nodes.insert(id, Node::from_draft(id, draft));
        debug!("added node {}", id);
        self.emit(GraphEvent::NodeAdded(&self.nodes[&id]));
        id
    }

    /// Add an edge built from `draft`. Both endpoints must be live nodes.
    ///
    /// Splices the new edge id into `from`'s outbound and `to`'s inbound
    /// adjacency lists (created lazily per neighbor pair), bumps the degree
    /// counters, and, for undirected edges in a graph that allows them,
    /// bumps the symmetric undirected reference counts. Fires
    /// [`GraphEvent::EdgeAdded`].
    pub fn add_edge(&mut self, draft: EdgeDraft) -> GraphResult<EdgeId> {
        if !self.nodes.contains_key(&draft.from) {
            return Err(GraphError::InvalidEdgeSource(draft.from));
        }
        if !self.nodes.contains_key(&draft.to) {
            return Err(GraphError::InvalidEdgeTarget(draft.to));
        }

        let id = EdgeId::new(self.edge_seq.next());
        let edge = Edge::from_draft(id, draft);
        let (from, to, directed) = (edge.from, edge.to, edge.directed);

        let from_node = &mut self.nodes[&from];
        from_node.outbound.entry(to).or_default().push(id);
        from_node.num_outbound += 1;

        let to_node = &mut self.nodes[&to];
        to_node.inbound.entry(from).or_default().push(id);
        to_node.num_inbound += 1;

        if self.options.allow_undirected && !directed {
            *self.nodes[&from].undirected_refs.entry(to).or_insert(0) += 1;
            *self.nodes[&to].undirected_refs.entry(from).or_insert(0) += 1;
        }

        self.edges.insert(id, edge);
        debug!("added edge {} ({} -> {})", id, from, to);
        self.emit(GraphEvent::EdgeAdded(&self.edges[&id]));
        Ok(id)
    }

    /// Remove a node and, as a cascade, every edge incident to it. Returns
    /// the removed node, or `None` (not an error) if it was already absent.
    ///
    /// Fires [`GraphEvent::NodeRemoved`] before the cascade; each cascaded
    /// edge removal fires its own event.
    pub fn remove_node(&mut self, node: impl NodeRef) -> Option<Node> {
        let id = node.node_id();
        if !self.nodes.contains_key(&id) {
            return None;
        }
        self.emit(GraphEvent::NodeRemoved(&self.nodes[&id]));

        // A self-loop id appears in both maps; the second removal is the
        // idempotent no-op, so every incident edge is removed exactly once.
        let incident: Vec<EdgeId> = {
            let n = &self.nodes[&id];
            n.inbound
                .values()
                .flatten()
                .chain(n.outbound.values().flatten())
                .copied()
                .collect()
        };
        for edge_id in incident {
            self.remove_edge(edge_id);
        }

        debug!("removed node {}", id);
        self.nodes.shift_remove(&id)
    }

    /// Remove an edge. Returns the removed edge, or `None` (not an error)
    /// if it was already absent.
    ///
    /// Unsplices the id from both endpoint adjacency lists but leaves the
    /// now-possibly-empty list entries in place; existence checks tolerate
    /// present-but-empty lists. Undirected reference counts are decremented
    /// with a floor at zero.
    pub fn remove_edge(&mut self, edge: impl EdgeRef) -> Option<Edge> {
        let id = edge.edge_id();
        if !self.edges.contains_key(&id) {
            return None;
        }
        self.emit(GraphEvent::EdgeRemoved(&self.edges[&id]));
        let edge = self.edges.shift_remove(&id)?;

        if let Some(from_node) = self.nodes.get_mut(&edge.from) {
            if let Some(list) = from_node.outbound.get_mut(&edge.to) {
                list.retain(|&edge_id| edge_id != id);
            }
            from_node.num_outbound -= 1;
        }
        if let Some(to_node) = self.nodes.get_mut(&edge.to) {
            if let Some(list) = to_node.inbound.get_mut(&edge.from) {
                list.retain(|&edge_id| edge_id != id);
            }
            to_node.num_inbound -= 1;
        }

        if self.options.allow_undirected && !edge.directed {
            if let Some(from_node) = self.nodes.get_mut(&edge.from) {
                if let Some(count) = from_node.undirected_refs.get_mut(&edge.to) {
                    *count = count.saturating_sub(1);
                }
            }
            if let Some(to_node) = self.nodes.get_mut(&edge.to) {
                if let Some(count) = to_node.undirected_refs.get_mut(&edge.from) {
                    *count = count.saturating_sub(1);
                }
            }
        }

        debug!("removed edge {}", id);
        Some(edge)
    }

    /// Factory-plus-insert shortcut for creating an edge between two nodes.
    /// Forced directed when the graph disallows undirected edges.
    pub fn link(
        &mut self,
        from: impl NodeRef,
        to: impl NodeRef,
        payload: PropertyMap,
        metadata: PropertyMap,
        directed: bool,
    ) -> GraphResult<EdgeId> {
        let directed = directed || !self.options.allow_undirected;
        let draft = if directed {
            EdgeDraft::new(from, to, payload, metadata)
        } else {
            EdgeDraft::undirected(from, to, payload, metadata)
        };
        self.add_edge(draft)
    }

    // ------------------------------------------------------------------
    // Identity resolution & existence
    // ------------------------------------------------------------------

    /// Look up a live node; absence is not an error.
    pub fn get_node(&self, node: impl NodeRef) -> Option<&Node> {
        self.nodes.get(&node.node_id())
    }

    /// Look up a live edge; absence is not an error.
    pub fn get_edge(&self, edge: impl EdgeRef) -> Option<&Edge> {
        self.edges.get(&edge.edge_id())
    }

    /// True iff `from` has at least one live edge directed at `to`.
    pub fn has_directed_edge(&self, from: impl NodeRef, to: impl NodeRef) -> bool {
        let to = to.node_id();
        self.get_node(from)
            .and_then(|n| n.outbound.get(&to))
            .map_or(false, |list| !list.is_empty())
    }

    /// True iff an undirected edge is live between the pair, in either
    /// nominal orientation. Always false when the graph disallows
    /// undirected edges.
    pub fn has_undirected_edge(&self, from: impl NodeRef, to: impl NodeRef) -> bool {
        let (from, to) = (from.node_id(), to.node_id());
        self.get_node(from).map_or(false, |n| n.undirected_count(to) > 0)
            || self.get_node(to).map_or(false, |n| n.undirected_count(from) > 0)
    }

    /// True iff a directed edge exists from `from` to `to`, or (when
    /// undirected edges are allowed) an undirected edge exists between the
    /// pair in either direction.
    pub fn has_any_edge(&self, from: impl NodeRef, to: impl NodeRef) -> bool {
        let (from, to) = (from.node_id(), to.node_id());
        if self.has_directed_edge(from, to) {
            return true;
        }
        self.options.allow_undirected && self.has_undirected_edge(from, to)
    }

    // ------------------------------------------------------------------
    // Eager query surface
    // ------------------------------------------------------------------

    /// All nodes, or only those whose payload partially matches `query`,
    /// in stable insertion order.
    pub fn get_nodes(&self, query: Option<&PropertyMap>) -> Vec<&Node> {
        match query {
            None => self.nodes.values().collect(),
            Some(q) => self.nodes.values().filter(|n| n.matches(q)).collect(),
        }
    }

    /// Order-preserving id-to-entity materialization. Dead ids are skipped.
    pub fn inflate_nodes(&self, ids: &[NodeId]) -> Vec<&Node> {
        ids.iter().filter_map(|id| self.nodes.get(id)).collect()
    }

    /// Order-preserving id-to-entity materialization. Dead ids are skipped.
    pub fn inflate_edges(&self, ids: &[EdgeId]) -> Vec<&Edge> {
        ids.iter().filter_map(|id| self.edges.get(id)).collect()
    }

    /// Resolve candidate ids to edges, then filter by payload query and/or
    /// directedness (`None` matches any directedness).
    pub fn get_edges(
        &self,
        edge_ids: &[EdgeId],
        query: Option<&PropertyMap>,
        directed: Option<bool>,
    ) -> Vec<&Edge> {
        self.inflate_edges(edge_ids)
            .into_iter()
            .filter(|edge| Self::edge_selected(edge, query, directed))
            .collect()
    }

    /// Edges extending from `node`, across all neighbors.
    pub fn get_edges_from(
        &self,
        node: impl NodeRef,
        query: Option<&PropertyMap>,
        directed: Option<bool>,
    ) -> Vec<&Edge> {
        let pool = self.from_pool(node.node_id(), directed);
        self.get_edges(&pool, query, directed)
    }

    /// Edges reaching `node`, across all neighbors.
    pub fn get_edges_to(
        &self,
        node: impl NodeRef,
        query: Option<&PropertyMap>,
        directed: Option<bool>,
    ) -> Vec<&Edge> {
        let pool = self.to_pool(node.node_id());
        self.get_edges(&pool, query, directed)
    }

    /// Edges whose nominal orientation is `from` -> `to`.
    pub fn get_edges_between(
        &self,
        from: impl NodeRef,
        to: impl NodeRef,
        query: Option<&PropertyMap>,
        directed: Option<bool>,
    ) -> Vec<&Edge> {
        let to = to.node_id();
        let pool: &[EdgeId] = self
            .get_node(from)
            .and_then(|n| n.outbound.get(&to))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        self.get_edges(pool, query, directed)
    }

    /// Nodes at the far end of `get_edges_from` results, order-preserving;
    /// parallel edges yield repeated nodes.
    pub fn get_linked_nodes(
        &self,
        node: impl NodeRef,
        query: Option<&PropertyMap>,
        directed: Option<bool>,
    ) -> Vec<&Node> {
        let id = node.node_id();
        self.get_edges_from(id, query, directed)
            .into_iter()
            .map(|edge| &self.nodes[&Self::linked_end(edge, id, directed)])
            .collect()
    }

    /// Nodes at the near end of `get_edges_to` results, order-preserving;
    /// parallel edges yield repeated nodes.
    pub fn get_linking_nodes(
        &self,
        node: impl NodeRef,
        query: Option<&PropertyMap>,
        directed: Option<bool>,
    ) -> Vec<&Node> {
        let id = node.node_id();
        self.get_edges_to(id, query, directed)
            .into_iter()
            .map(|edge| &self.nodes[&Self::linking_end(edge, id, directed)])
            .collect()
    }

    // ------------------------------------------------------------------
    // Lazy query surface
    // ------------------------------------------------------------------

    /// Lazy counterpart of [`get_nodes`](Self::get_nodes).
    pub fn get_nodes_iter<'a>(
        &'a self,
        query: Option<&'a PropertyMap>,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        matching(yield_all(self.nodes.values()), move |node: &&Node| {
            query.map_or(true, |q| node.matches(q))
        })
    }

    /// Lazy counterpart of [`inflate_nodes`](Self::inflate_nodes).
    pub fn inflate_nodes_iter<'a, I>(&'a self, ids: I) -> impl Iterator<Item = &'a Node> + 'a
    where
        I: IntoIterator<Item = NodeId>,
        I::IntoIter: 'a,
    {
        mapped(yield_all(ids), move |id| self.nodes.get(&id)).flatten()
    }

    /// Lazy counterpart of [`inflate_edges`](Self::inflate_edges).
    pub fn inflate_edges_iter<'a, I>(&'a self, ids: I) -> impl Iterator<Item = &'a Edge> + 'a
    where
        I: IntoIterator<Item = EdgeId>,
        I::IntoIter: 'a,
    {
        mapped(yield_all(ids), move |id| self.edges.get(&id)).flatten()
    }

    /// Lazy counterpart of [`get_edges`](Self::get_edges).
    pub fn get_edges_iter<'a, I>(
        &'a self,
        edge_ids: I,
        query: Option<&'a PropertyMap>,
        directed: Option<bool>,
    ) -> impl Iterator<Item = &'a Edge> + 'a
    where
        I: IntoIterator<Item = EdgeId>,
        I::IntoIter: 'a,
    {
        matching(self.inflate_edges_iter(edge_ids), move |edge: &&Edge| {
            Self::edge_selected(edge, query, directed)
        })
    }

    /// Lazy counterpart of [`get_edges_from`](Self::get_edges_from):
    /// matching over inflation over a union of per-neighbor enumerations.
    pub fn get_edges_from_iter<'a>(
        &'a self,
        node: impl NodeRef,
        query: Option<&'a PropertyMap>,
        directed: Option<bool>,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        let mut sources: Vec<std::slice::Iter<'a, EdgeId>> = Vec::new();
        if let Some(n) = self.get_node(node) {
            sources.extend(n.outbound.values().map(|ids| yield_all(ids.as_slice())));
            if directed == Some(false) {
                sources.extend(n.inbound.values().map(|ids| yield_all(ids.as_slice())));
            }
        }
        let candidates = mapped(union(sources), |id: &EdgeId| *id);
        self.get_edges_iter(candidates, query, directed)
    }

    /// Lazy counterpart of [`get_edges_to`](Self::get_edges_to).
    pub fn get_edges_to_iter<'a>(
        &'a self,
        node: impl NodeRef,
        query: Option<&'a PropertyMap>,
        directed: Option<bool>,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        let mut sources: Vec<std::slice::Iter<'a, EdgeId>> = Vec::new();
        if let Some(n) = self.get_node(node) {
            sources.extend(n.inbound.values().map(|ids| yield_all(ids.as_slice())));
        }
        let candidates = mapped(union(sources), |id: &EdgeId| *id);
        self.get_edges_iter(candidates, query, directed)
    }

    /// Lazy counterpart of [`get_edges_between`](Self::get_edges_between).
    pub fn get_edges_between_iter<'a>(
        &'a self,
        from: impl NodeRef,
        to: impl NodeRef,
        query: Option<&'a PropertyMap>,
        directed: Option<bool>,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        let to = to.node_id();
        let pool: &[EdgeId] = self
            .get_node(from)
            .and_then(|n| n.outbound.get(&to))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let candidates = mapped(yield_all(pool), |id: &EdgeId| *id);
        self.get_edges_iter(candidates, query, directed)
    }

    /// Lazy counterpart of [`get_linked_nodes`](Self::get_linked_nodes).
    pub fn get_linked_nodes_iter<'a>(
        &'a self,
        node: impl NodeRef,
        query: Option<&'a PropertyMap>,
        directed: Option<bool>,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        let id = node.node_id();
        mapped(self.get_edges_from_iter(id, query, directed), move |edge| {
            &self.nodes[&Self::linked_end(edge, id, directed)]
        })
    }

    /// Lazy counterpart of [`get_linking_nodes`](Self::get_linking_nodes).
    pub fn get_linking_nodes_iter<'a>(
        &'a self,
        node: impl NodeRef,
        query: Option<&'a PropertyMap>,
        directed: Option<bool>,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        let id = node.node_id();
        mapped(self.get_edges_to_iter(id, query, directed), move |edge| {
            &self.nodes[&Self::linking_end(edge, id, directed)]
        })
    }

    // ------------------------------------------------------------------
    // Pack & merge
    // ------------------------------------------------------------------

    /// Copy of this graph with ids renumbered densely from zero; tombstone
    /// gaps from prior removals are eliminated. Preserves
    /// `allow_undirected`; the copy carries no observer.
    pub fn pack(&self) -> Graph {
        let mut packed =
            Graph::with_options(GraphOptions::new().allow_undirected(self.options.allow_undirected));
        packed.absorb(self);
        debug!("packed graph: {} nodes, {} edges", packed.node_count(), packed.edge_count());
        packed
    }

    /// Disjoint union: a packed copy of this graph plus packed copies of
    /// `other`'s live nodes and edges. No cross-links are inferred.
    pub fn merge_with(&self, other: &Graph) -> Graph {
        let mut merged = self.pack();
        merged.absorb(other);
        debug!("merged graphs: {} nodes, {} edges", merged.node_count(), merged.edge_count());
        merged
    }

    /// Insert copies of every live node and edge of `other`, renumbering
    /// through a fresh old-to-new id mapping.
    fn absorb(&mut self, other: &Graph) -> FxHashMap<NodeId, NodeId> {
        let mut mapping: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        for node in other.nodes.values() {
            let new_id = self.add_node(NodeDraft::new(node.payload.clone(), node.metadata.clone()));
            mapping.insert(node.id, new_id);
        }
        for edge in other.edges.values() {
            let draft = EdgeDraft {
                from: mapping[&edge.from],
                to: mapping[&edge.to],
                directed: edge.directed,
                payload: edge.payload.clone(),
                metadata: edge.metadata.clone(),
            };
            self.add_edge(draft)
                .expect("renumbered endpoints are always live");
        }
        mapping
    }

    // ------------------------------------------------------------------
    // Shared selection helpers
    // ------------------------------------------------------------------

    fn edge_selected(edge: &Edge, query: Option<&PropertyMap>, directed: Option<bool>) -> bool {
        directed.map_or(true, |d| edge.directed == d) && query.map_or(true, |q| edge.matches(q))
    }

    /// Candidate pool for edges extending from `node`. For an undirected
    /// selection the pool also covers inbound lists: an undirected edge is
    /// incident regardless of its nominal orientation.
    fn from_pool(&self, node: NodeId, directed: Option<bool>) -> Vec<EdgeId> {
        match self.nodes.get(&node) {
            None => Vec::new(),
            Some(n) => {
                let mut pool: Vec<EdgeId> = n.outbound.values().flatten().copied().collect();
                if directed == Some(false) {
                    pool.extend(n.inbound.values().flatten().copied());
                }
                pool
            }
        }
    }

    fn to_pool(&self, node: NodeId) -> Vec<EdgeId> {
        match self.nodes.get(&node) {
            None => Vec::new(),
            Some(n) => n.inbound.values().flatten().copied().collect(),
        }
    }

    fn linked_end(edge: &Edge, node: NodeId, directed: Option<bool>) -> NodeId {
        if directed == Some(false) {
            edge.far_end(node)
        } else {
            edge.to
        }
    }

    fn linking_end(edge: &Edge, node: NodeId, directed: Option<bool>) -> NodeId {
        if directed == Some(false) {
            edge.far_end(node)
        } else {
            edge.from
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Graph::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.nodes.len())
            .field("edge_count", &self.edges.len())
            .field("allow_undirected", &self.options.allow_undirected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyValue;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn props(entries: &[(&str, PropertyValue)]) -> PropertyMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn user(name: &str) -> PropertyMap {
        props(&[("user", name.into())])
    }

    fn edge_type(kind: &str) -> PropertyMap {
        props(&[("type", kind.into())])
    }

    #[test]
    fn test_add_and_get_node() {
        let mut graph = Graph::new();
        let id = graph.add_node(NodeDraft::new(user("x"), PropertyMap::new()));

        assert_eq!(graph.node_count(), 1);
        let node = graph.get_node(id).unwrap();
        assert_eq!(node.id, id);
        assert_eq!(node.payload.get("user").unwrap().as_string(), Some("x"));
    }

    #[test]
    fn test_node_ids_are_unique_and_increasing() {
        let mut graph = Graph::new();
        let ids: Vec<NodeId> = (0..50)
            .map(|_| graph.add_node(NodeDraft::empty()))
            .collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_add_edge_updates_adjacency() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        let e = graph
            .add_edge(EdgeDraft::new(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();

        assert_eq!(graph.edge_count(), 1);
        let edge = graph.get_edge(e).unwrap();
        assert_eq!(edge.from, a);
        assert_eq!(edge.to, b);

        let from = graph.get_node(a).unwrap();
        assert_eq!(from.num_outbound, 1);
        assert_eq!(from.outbound()[&b], vec![e]);
        let to = graph.get_node(b).unwrap();
        assert_eq!(to.num_inbound, 1);
        assert_eq!(to.inbound()[&a], vec![e]);
    }

    #[test]
    fn test_add_edge_validates_endpoints() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        let ghost = NodeId::new(999);

        let result = graph.add_edge(EdgeDraft::new(ghost, a, PropertyMap::new(), PropertyMap::new()));
        assert_eq!(result, Err(GraphError::InvalidEdgeSource(ghost)));

        let result = graph.add_edge(EdgeDraft::new(a, ghost, PropertyMap::new(), PropertyMap::new()));
        assert_eq!(result, Err(GraphError::InvalidEdgeTarget(ghost)));
    }

    #[test]
    fn test_directed_asymmetry() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        graph
            .add_edge(EdgeDraft::new(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();

        assert!(graph.has_directed_edge(a, b));
        assert!(graph.has_any_edge(a, b));
        assert!(!graph.has_directed_edge(b, a));
        assert!(!graph.has_any_edge(b, a));
    }

    #[test]
    fn test_undirected_symmetry() {
        let mut graph = Graph::with_options(GraphOptions::new().allow_undirected(true));
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        graph
            .add_edge(EdgeDraft::undirected(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();

        assert!(graph.has_any_edge(a, b));
        assert!(graph.has_any_edge(b, a));
        assert!(graph.has_undirected_edge(a, b));
        assert!(graph.has_undirected_edge(b, a));
        assert!(!graph.has_directed_edge(b, a));
    }

    #[test]
    fn test_remove_edge_is_idempotent_and_keeps_empty_lists() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        let e = graph
            .add_edge(EdgeDraft::new(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();

        assert!(graph.remove_edge(e).is_some());
        assert!(graph.remove_edge(e).is_none());
        assert_eq!(graph.edge_count(), 0);

        // The neighbor entry survives, empty; existence checks must not be
        // fooled by it.
        let from = graph.get_node(a).unwrap();
        assert!(from.outbound().contains_key(&b));
        assert!(from.outbound()[&b].is_empty());
        assert!(!graph.has_directed_edge(a, b));
        assert_eq!(from.num_outbound, 0);
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        let c = graph.add_node(NodeDraft::empty());
        let ab = graph
            .add_edge(EdgeDraft::new(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();
        let ca = graph
            .add_edge(EdgeDraft::new(c, a, PropertyMap::new(), PropertyMap::new()))
            .unwrap();
        let bc = graph
            .add_edge(EdgeDraft::new(b, c, PropertyMap::new(), PropertyMap::new()))
            .unwrap();

        assert!(graph.remove_node(a).is_some());
        assert!(graph.get_node(a).is_none());
        assert!(graph.get_edge(ab).is_none());
        assert!(graph.get_edge(ca).is_none());
        assert!(graph.get_edge(bc).is_some());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);

        // Removing again is a no-op.
        assert!(graph.remove_node(a).is_none());
    }

    #[test]
    fn test_remove_node_with_self_loop() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        let e = graph
            .add_edge(EdgeDraft::new(a, a, PropertyMap::new(), PropertyMap::new()))
            .unwrap();

        assert!(graph.remove_node(a).is_some());
        assert!(graph.get_edge(e).is_none());
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_ids_are_not_reused_after_removal() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        graph.remove_node(a);
        let b = graph.add_node(NodeDraft::empty());
        assert!(b > a);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_undirected_count_clamps_at_zero() {
        let mut graph = Graph::with_options(GraphOptions::new().allow_undirected(true));
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        let e = graph
            .add_edge(EdgeDraft::undirected(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();

        graph.remove_edge(e);
        graph.remove_edge(e);
        assert_eq!(graph.get_node(a).unwrap().undirected_count(b), 0);
        assert!(!graph.has_undirected_edge(a, b));
    }

    #[test]
    fn test_get_nodes_with_query() {
        let mut graph = Graph::new();
        let n1 = graph.add_node(NodeDraft::new(
            props(&[("age", 20i64.into()), ("active", true.into())]),
            PropertyMap::new(),
        ));
        graph.add_node(NodeDraft::new(
            props(&[("age", 20i64.into()), ("active", false.into())]),
            PropertyMap::new(),
        ));
        graph.add_node(NodeDraft::new(
            props(&[("age", 30i64.into()), ("active", false.into())]),
            PropertyMap::new(),
        ));

        let query = props(&[("age", 20i64.into()), ("active", true.into())]);
        let selected = graph.get_nodes(Some(&query));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, n1);

        assert_eq!(graph.get_nodes(None).len(), 3);
    }

    #[test]
    fn test_get_edges_filters_by_query_and_directedness() {
        let mut graph = Graph::with_options(GraphOptions::new().allow_undirected(true));
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        let friend_u = graph
            .add_edge(EdgeDraft::undirected(a, b, edge_type("friend"), PropertyMap::new()))
            .unwrap();
        let friend_d = graph
            .add_edge(EdgeDraft::new(a, b, edge_type("friend"), PropertyMap::new()))
            .unwrap();
        let colleague = graph
            .add_edge(EdgeDraft::new(a, b, edge_type("colleague"), PropertyMap::new()))
            .unwrap();

        let all = [friend_u, friend_d, colleague];
        let query = edge_type("friend");

        let friends = graph.get_edges(&all, Some(&query), None);
        assert_eq!(friends.len(), 2);

        let directed_friends = graph.get_edges(&all, Some(&query), Some(true));
        assert_eq!(directed_friends.len(), 1);
        assert_eq!(directed_friends[0].id, friend_d);

        let undirected = graph.get_edges(&all, None, Some(false));
        assert_eq!(undirected.len(), 1);
        assert_eq!(undirected[0].id, friend_u);
    }

    #[test]
    fn test_get_edges_skips_dead_candidates() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        let e1 = graph
            .add_edge(EdgeDraft::new(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();
        let e2 = graph
            .add_edge(EdgeDraft::new(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();
        graph.remove_edge(e1);

        let edges = graph.get_edges(&[e1, e2], None, None);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].id, e2);
    }

    #[test]
    fn test_inflate_iters_skip_dead_ids() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        let e1 = graph
            .add_edge(EdgeDraft::new(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();
        let e2 = graph
            .add_edge(EdgeDraft::new(b, a, PropertyMap::new(), PropertyMap::new()))
            .unwrap();
        graph.remove_edge(e1);

        let nodes: Vec<&Node> = graph.inflate_nodes_iter([a, NodeId::new(999), b]).collect();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, a);
        assert_eq!(nodes[1].id, b);

        let edges: Vec<&Edge> = graph.inflate_edges_iter([e1, e2]).collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].id, e2);
    }

    #[test]
    fn test_linked_nodes_keep_edge_order_and_duplicates() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::new(user("x"), PropertyMap::new()));
        let b = graph.add_node(NodeDraft::new(user("y"), PropertyMap::new()));
        let c = graph.add_node(NodeDraft::new(user("z"), PropertyMap::new()));
        graph
            .add_edge(EdgeDraft::new(a, b, edge_type("friend"), PropertyMap::new()))
            .unwrap();
        graph
            .add_edge(EdgeDraft::new(a, b, edge_type("colleague"), PropertyMap::new()))
            .unwrap();
        graph
            .add_edge(EdgeDraft::new(a, c, edge_type("friend"), PropertyMap::new()))
            .unwrap();

        let query = edge_type("friend");
        let linked = graph.get_linked_nodes(a, Some(&query), None);
        assert_eq!(linked.len(), 2);
        assert_eq!(linked[0].id, b);
        assert_eq!(linked[1].id, c);

        // Without a query, the two parallel a->b edges repeat b.
        let all = graph.get_linked_nodes(a, None, None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, b);
        assert_eq!(all[1].id, b);
        assert_eq!(all[2].id, c);
    }

    #[test]
    fn test_linking_nodes() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::new(user("x"), PropertyMap::new()));
        let b = graph.add_node(NodeDraft::new(user("y"), PropertyMap::new()));
        let c = graph.add_node(NodeDraft::new(user("z"), PropertyMap::new()));
        graph
            .add_edge(EdgeDraft::new(b, a, edge_type("friend"), PropertyMap::new()))
            .unwrap();
        graph
            .add_edge(EdgeDraft::new(b, a, edge_type("colleague"), PropertyMap::new()))
            .unwrap();
        graph
            .add_edge(EdgeDraft::new(c, a, edge_type("friend"), PropertyMap::new()))
            .unwrap();

        let query = edge_type("friend");
        let linking = graph.get_linking_nodes(a, Some(&query), None);
        assert_eq!(linking.len(), 2);
        assert_eq!(linking[0].id, b);
        assert_eq!(linking[1].id, c);
    }

    #[test]
    fn test_get_edges_between() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        let c = graph.add_node(NodeDraft::empty());
        let ab1 = graph
            .add_edge(EdgeDraft::new(a, b, edge_type("friend"), PropertyMap::new()))
            .unwrap();
        graph
            .add_edge(EdgeDraft::new(a, b, edge_type("colleague"), PropertyMap::new()))
            .unwrap();
        graph
            .add_edge(EdgeDraft::new(a, c, edge_type("friend"), PropertyMap::new()))
            .unwrap();

        let query = edge_type("friend");
        let between = graph.get_edges_between(a, b, Some(&query), None);
        assert_eq!(between.len(), 1);
        assert_eq!(between[0].id, ab1);

        assert!(graph.get_edges_between(b, a, None, None).is_empty());
    }

    #[test]
    fn test_link_shortcut() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());

        // Graph disallows undirected edges, so directed=false is forced
        // directed.
        let e = graph
            .link(a, b, edge_type("friend"), PropertyMap::new(), false)
            .unwrap();
        assert!(graph.get_edge(e).unwrap().directed);
        assert!(graph.has_directed_edge(a, b));
    }

    #[test]
    fn test_observer_sees_all_mutations() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let mut graph = Graph::with_options(GraphOptions::new().observer(move |event| {
            let entry = match event {
                GraphEvent::NodeAdded(n) => format!("+n{}", n.id.as_u64()),
                GraphEvent::EdgeAdded(e) => format!("+e{}", e.id.as_u64()),
                GraphEvent::NodeRemoved(n) => format!("-n{}", n.id.as_u64()),
                GraphEvent::EdgeRemoved(e) => format!("-e{}", e.id.as_u64()),
            };
            sink.borrow_mut().push(entry);
        }));

        let a = graph.add_node(NodeDraft::empty());
        let b = graph.add_node(NodeDraft::empty());
        graph
            .add_edge(EdgeDraft::new(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();
        graph.remove_node(a);

        assert_eq!(
            *log.borrow(),
            vec!["+n0", "+n1", "+e0", "-n0", "-e0"]
        );
    }

    #[test]
    fn test_pack_renumbers_densely() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::new(user("x"), PropertyMap::new()));
        let b = graph.add_node(NodeDraft::new(user("y"), PropertyMap::new()));
        let c = graph.add_node(NodeDraft::new(user("z"), PropertyMap::new()));
        graph
            .add_edge(EdgeDraft::new(a, b, edge_type("friend"), PropertyMap::new()))
            .unwrap();
        graph
            .add_edge(EdgeDraft::new(b, c, edge_type("friend"), PropertyMap::new()))
            .unwrap();
        graph.remove_node(b);

        let packed = graph.pack();
        assert_eq!(packed.node_count(), 2);
        assert_eq!(packed.edge_count(), 0);
        let ids: Vec<u64> = packed.get_nodes(None).iter().map(|n| n.id.as_u64()).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(
            packed.get_nodes(None)[0].payload.get("user").unwrap().as_string(),
            Some("x")
        );
    }

    #[test]
    fn test_pack_rewrites_edge_endpoints() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeDraft::new(user("x"), PropertyMap::new()));
        let b = graph.add_node(NodeDraft::new(user("y"), PropertyMap::new()));
        let c = graph.add_node(NodeDraft::new(user("z"), PropertyMap::new()));
        graph
            .add_edge(EdgeDraft::new(a, c, edge_type("friend"), PropertyMap::new()))
            .unwrap();
        graph.remove_node(b);

        let packed = graph.pack();
        assert_eq!(packed.node_count(), 2);
        assert_eq!(packed.edge_count(), 1);
        let x = packed.get_nodes(None)[0];
        let far = packed.get_linked_nodes(x, None, None);
        assert_eq!(far.len(), 1);
        assert_eq!(far[0].payload.get("user").unwrap().as_string(), Some("z"));
    }

    #[test]
    fn test_merge_with_is_disjoint_union() {
        let mut g1 = Graph::new();
        let a = g1.add_node(NodeDraft::new(user("x"), PropertyMap::new()));
        let b = g1.add_node(NodeDraft::new(user("y"), PropertyMap::new()));
        g1.add_edge(EdgeDraft::new(a, b, PropertyMap::new(), PropertyMap::new()))
            .unwrap();

        let mut g2 = Graph::new();
        let c = g2.add_node(NodeDraft::new(user("z"), PropertyMap::new()));
        let d = g2.add_node(NodeDraft::new(user("w"), PropertyMap::new()));
        g2.add_edge(EdgeDraft::new(c, d, PropertyMap::new(), PropertyMap::new()))
            .unwrap();

        let merged = g1.merge_with(&g2);
        assert_eq!(merged.node_count(), 4);
        assert_eq!(merged.edge_count(), 2);

        let users: Vec<&str> = merged
            .get_nodes(None)
            .iter()
            .map(|n| n.payload.get("user").unwrap().as_string().unwrap())
            .collect();
        assert_eq!(users, vec!["x", "y", "z", "w"]);

        // No cross-links between the two fragments.
        let x = merged.get_nodes(None)[0].id;
        let z = merged.get_nodes(None)[2].id;
        assert!(!merged.has_any_edge(x, z));
    }
}
