//! Mutation events delivered to an optional observer.
//!
//! Events fire synchronously, inline with the triggering operation: added
//! entities are reported after they are stored, removed entities before they
//! are unspliced. Any context the embedder needs travels in the callback's
//! closure.

use crate::edge::Edge;
use crate::node::Node;

/// A change to the graph, borrowing the affected entity.
#[derive(Debug)]
pub enum GraphEvent<'a> {
    NodeAdded(&'a Node),
    EdgeAdded(&'a Edge),
    NodeRemoved(&'a Node),
    EdgeRemoved(&'a Edge),
}

/// Observer callback type stored in `GraphOptions`.
pub type Observer = Box<dyn Fn(GraphEvent<'_>)>;
