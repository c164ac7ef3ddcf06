//! Read-only view of a replica's placement.

use nodepool_state::NodeId;

/// A replica bound to a resource group and the nodes it was placed on.
///
/// Membership of its group may change underneath it; the resource manager
/// reports the resulting drift without modifying the replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica {
    pub id: i64,
    pub resource_group: String,
    pub nodes: Vec<NodeId>,
}

impl Replica {
    pub fn new(id: i64, resource_group: impl Into<String>, nodes: Vec<NodeId>) -> Self {
        Self {
            id,
            resource_group: resource_group.into(),
            nodes,
        }
    }
}
