//! Type-safe wrappers for CFG node and allocation-site identifiers.
//!
//! Both identifiers are plain indices with distinct newtypes.

use std::fmt;

/// Index of a node in a procedure's control-flow graph (0-indexed).
///
/// Node ids are assigned in statement order by the front-end and are
/// stable for the lifetime of the procedure.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates a node id from a raw statement index.
    pub fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index as a `usize`.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<NodeId> for usize {
    fn from(node: NodeId) -> Self {
        node.0
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

/// Stable identifier of an allocation site of the bounded collection.
///
/// A site is identified by the CFG node holding its constructor call, so
/// the identifier stays valid for as long as the procedure does.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SiteId(NodeId);

impl SiteId {
    /// Creates a site id for the constructor call at `node`.
    pub fn new(node: NodeId) -> Self {
        SiteId(node)
    }

    /// Returns the node holding the constructor call.
    pub fn node(self) -> NodeId {
        self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site@{}", self.0)
    }
}
