//! Trellis
//!
//! An in-memory, mutable property graph: nodes and edges carrying free-form
//! payload and metadata maps, directed and optionally undirected edges,
//! per-node adjacency indices, and a query surface that comes in two
//! observationally equivalent flavors, eager (`Vec` results) and lazy
//! (pull-based iterators suspending between elements).
//!
//! Graphs snapshot to JSON and restore without replaying mutations, and can
//! be compacted (`pack`) or combined (`merge_with`) with dense id
//! renumbering.
//!
//! # Example Usage
//!
//! ```rust
//! use trellis::{EdgeDraft, Graph, NodeDraft, PropertyMap, PropertyValue};
//!
//! let mut graph = Graph::new();
//!
//! let mut payload = PropertyMap::new();
//! payload.insert("user".to_string(), PropertyValue::String("alice".into()));
//! let alice = graph.add_node(NodeDraft::new(payload, PropertyMap::new()));
//!
//! let mut payload = PropertyMap::new();
//! payload.insert("user".to_string(), PropertyValue::String("bob".into()));
//! let bob = graph.add_node(NodeDraft::new(payload, PropertyMap::new()));
//!
//! let mut kind = PropertyMap::new();
//! kind.insert("type".to_string(), PropertyValue::String("friend".into()));
//! graph
//!     .add_edge(EdgeDraft::new(alice, bob, kind.clone(), PropertyMap::new()))
//!     .unwrap();
//!
//! assert!(graph.has_directed_edge(alice, bob));
//! assert!(!graph.has_directed_edge(bob, alice));
//!
//! // Eager and lazy traversals agree.
//! let eager = graph.get_linked_nodes(alice, Some(&kind), None);
//! let lazy: Vec<_> = graph.get_linked_nodes_iter(alice, Some(&kind), None).collect();
//! assert_eq!(eager, lazy);
//! ```

#![warn(clippy::all)]

pub mod edge;
pub mod event;
pub mod iter;
pub mod node;
pub mod property;
pub mod sequence;
pub mod snapshot;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use edge::{Edge, EdgeDraft, EdgeRef};
pub use event::{GraphEvent, Observer};
pub use node::{Node, NodeDraft, NodeRef};
pub use property::{matches_query, PropertyMap, PropertyValue};
pub use sequence::IdSequence;
pub use snapshot::{GraphSnapshot, SnapshotError};
pub use store::{Graph, GraphError, GraphOptions, GraphResult};
pub use types::{EdgeId, NodeId};
