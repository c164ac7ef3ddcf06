//! Node liveness seam.

use nodepool_state::{NodeId, NodeInfo};

/// Source of truth for which nodes are alive.
///
/// Answers are never cached by the resource manager beyond a single
/// operation.
pub trait NodeRegistry: Send + Sync {
    /// Node info, or `None` if the node is gone.
    fn get(&self, id: NodeId) -> Option<NodeInfo>;

    /// Whether the node is shutting down gracefully.
    fn is_stopping(&self, id: NodeId) -> bool;
}
