//! Membership manager — tracks cluster node state.
//!
//! Persists the set of joined nodes to the `StateStore` and derives
//! liveness from heartbeat age. A node that missed heartbeats for longer
//! than the dead timeout is reported as gone to the resource manager.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nodepool_groups::NodeRegistry;
use nodepool_state::*;
use tracing::{debug, info, warn};

/// Status of a node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Ready,
    /// Shutting down gracefully; must not receive new assignments.
    Stopping,
    /// Missed heartbeats for longer than the dead timeout.
    Dead,
}

/// In-memory view of a cluster member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub node_id: NodeId,
    pub address: String,
    pub status: MemberStatus,
    pub last_heartbeat: u64,
}

/// Manages cluster membership state.
pub struct MembershipManager {
    state: StateStore,
    /// Dead node detection threshold.
    dead_timeout: Duration,
}

impl MembershipManager {
    /// Create a new membership manager.
    pub fn new(state: StateStore) -> Self {
        Self {
            state,
            dead_timeout: Duration::from_secs(30),
        }
    }

    /// Set the dead node detection timeout.
    pub fn with_dead_timeout(mut self, timeout: Duration) -> Self {
        self.dead_timeout = timeout;
        self
    }

    /// Register a node, or refresh it if it is already known.
    ///
    /// Rejoining clears the draining flag.
    pub fn join(&self, node_id: NodeId, address: &str) -> StateResult<()> {
        let node = NodeInfo {
            id: node_id,
            address: address.to_string(),
            stopping: false,
            last_heartbeat: epoch_secs(),
        };
        self.state.put_node(&node)?;
        info!(node_id, %address, "node joined cluster");
        Ok(())
    }

    /// Record a heartbeat. Returns false for unknown nodes.
    pub fn heartbeat(&self, node_id: NodeId) -> StateResult<bool> {
        match self.state.get_node(node_id)? {
            Some(mut node) => {
                node.last_heartbeat = epoch_secs();
                self.state.put_node(&node)?;
                debug!(node_id, "heartbeat received");
                Ok(true)
            }
            None => {
                warn!(node_id, "heartbeat from unknown node");
                Ok(false)
            }
        }
    }

    /// Mark a node as shutting down. Returns false for unknown nodes.
    pub fn drain(&self, node_id: NodeId) -> StateResult<bool> {
        match self.state.get_node(node_id)? {
            Some(mut node) => {
                node.stopping = true;
                self.state.put_node(&node)?;
                info!(node_id, "node draining");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a node from the cluster.
    pub fn leave(&self, node_id: NodeId) -> StateResult<bool> {
        let existed = self.state.delete_node(node_id)?;
        if existed {
            info!(node_id, "node left cluster");
        }
        Ok(existed)
    }

    /// List all current members with their status.
    pub fn list_members(&self) -> StateResult<Vec<Member>> {
        let now = epoch_secs();
        let nodes = self.state.list_nodes()?;
        Ok(nodes.into_iter().map(|n| self.to_member(n, now)).collect())
    }

    /// Get a single member by id.
    pub fn get_member(&self, node_id: NodeId) -> StateResult<Option<Member>> {
        let now = epoch_secs();
        Ok(self
            .state
            .get_node(node_id)?
            .map(|n| self.to_member(n, now)))
    }

    /// Detect and remove dead nodes.
    ///
    /// Returns the ids of nodes that were removed.
    pub fn reap_dead_nodes(&self) -> StateResult<Vec<NodeId>> {
        let mut reaped = Vec::new();
        for member in self.list_members()? {
            if member.status == MemberStatus::Dead {
                self.state.delete_node(member.node_id)?;
                warn!(node_id = member.node_id, "reaped dead node");
                reaped.push(member.node_id);
            }
        }
        Ok(reaped)
    }

    fn is_dead(&self, node: &NodeInfo, now: u64) -> bool {
        now.saturating_sub(node.last_heartbeat) > self.dead_timeout.as_secs()
    }

    fn to_member(&self, node: NodeInfo, now: u64) -> Member {
        let status = if self.is_dead(&node, now) {
            MemberStatus::Dead
        } else if node.stopping {
            MemberStatus::Stopping
        } else {
            MemberStatus::Ready
        };

        Member {
            node_id: node.id,
            address: node.address,
            status,
            last_heartbeat: node.last_heartbeat,
        }
    }
}

impl NodeRegistry for MembershipManager {
    fn get(&self, id: NodeId) -> Option<NodeInfo> {
        let node = match self.state.get_node(id) {
            Ok(node) => node?,
            Err(e) => {
                warn!(node_id = id, error = %e, "failed to read node from state store");
                return None;
            }
        };
        if self.is_dead(&node, epoch_secs()) {
            return None;
        }
        Some(node)
    }

    fn is_stopping(&self, id: NodeId) -> bool {
        matches!(self.state.get_node(id), Ok(Some(node)) if node.stopping)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> StateStore {
        StateStore::open_in_memory().unwrap()
    }

    /// Push a node's last heartbeat far into the past.
    fn age(state: &StateStore, node_id: NodeId) {
        let mut node = state.get_node(node_id).unwrap().unwrap();
        node.last_heartbeat = 1000;
        state.put_node(&node).unwrap();
    }

    #[test]
    fn join_creates_node() {
        let mgr = MembershipManager::new(test_state());
        mgr.join(1, "10.0.0.1:21123").unwrap();

        let member = mgr.get_member(1).unwrap().unwrap();
        assert_eq!(member.address, "10.0.0.1:21123");
        assert_eq!(member.status, MemberStatus::Ready);
        assert!(mgr.get(1).is_some());
    }

    #[test]
    fn heartbeat_unknown_node_returns_false() {
        let mgr = MembershipManager::new(test_state());
        assert!(!mgr.heartbeat(9).unwrap());
    }

    #[test]
    fn heartbeat_revives_node() {
        let state = test_state();
        let mgr = MembershipManager::new(state.clone());
        mgr.join(1, "10.0.0.1:21123").unwrap();
        age(&state, 1);
        assert!(mgr.get(1).is_none());

        assert!(mgr.heartbeat(1).unwrap());
        assert!(mgr.get(1).is_some());
    }

    #[test]
    fn drain_marks_stopping() {
        let mgr = MembershipManager::new(test_state());
        mgr.join(1, "10.0.0.1:21123").unwrap();

        assert!(mgr.drain(1).unwrap());
        assert!(mgr.is_stopping(1));
        // A stopping node is still known.
        assert!(mgr.get(1).is_some());
        assert_eq!(mgr.get_member(1).unwrap().unwrap().status, MemberStatus::Stopping);

        assert!(!mgr.drain(2).unwrap());
        assert!(!mgr.is_stopping(2));
    }

    #[test]
    fn rejoin_clears_stopping() {
        let mgr = MembershipManager::new(test_state());
        mgr.join(1, "10.0.0.1:21123").unwrap();
        mgr.drain(1).unwrap();
        mgr.join(1, "10.0.0.1:21123").unwrap();

        assert!(!mgr.is_stopping(1));
    }

    #[test]
    fn leave_removes_node() {
        let mgr = MembershipManager::new(test_state());
        mgr.join(1, "10.0.0.1:21123").unwrap();

        assert!(mgr.leave(1).unwrap());
        assert!(mgr.get_member(1).unwrap().is_none());
        assert!(mgr.get(1).is_none());
        assert!(!mgr.leave(1).unwrap());
    }

    #[test]
    fn dead_node_detection() {
        let state = test_state();
        let mgr = MembershipManager::new(state.clone());
        mgr.join(1, "10.0.0.1:21123").unwrap();
        age(&state, 1);

        let member = mgr.get_member(1).unwrap().unwrap();
        assert_eq!(member.status, MemberStatus::Dead);
        assert!(mgr.get(1).is_none());
    }

    #[test]
    fn reap_dead_nodes() {
        let state = test_state();
        let mgr = MembershipManager::new(state.clone())
            .with_dead_timeout(Duration::from_secs(60));
        mgr.join(1, "10.0.0.1:21123").unwrap();
        mgr.join(2, "10.0.0.2:21123").unwrap();
        age(&state, 1);

        assert_eq!(mgr.reap_dead_nodes().unwrap(), vec![1]);
        let ids: Vec<_> = mgr.list_members().unwrap().iter().map(|m| m.node_id).collect();
        assert_eq!(ids, vec![2]);
    }
}
