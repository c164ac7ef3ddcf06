//! Persisted record types.

use serde::{Deserialize, Serialize};

/// Cluster-wide node identifier.
pub type NodeId = i64;

/// Durable shape of a resource group.
///
/// `capacity` is the declared target size and may differ from
/// `nodes.len()` while membership lags behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceGroupRecord {
    pub name: String,
    pub capacity: i32,
    #[serde(default)]
    pub nodes: Vec<NodeId>,
}

impl ResourceGroupRecord {
    pub fn new(name: impl Into<String>, capacity: i32, nodes: Vec<NodeId>) -> Self {
        Self {
            name: name.into(),
            capacity,
            nodes,
        }
    }
}

/// A node known to the cluster registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub address: String,
    /// Set while the node is shutting down gracefully.
    #[serde(default)]
    pub stopping: bool,
    /// Unix timestamp (seconds) of the last heartbeat.
    pub last_heartbeat: u64,
}
