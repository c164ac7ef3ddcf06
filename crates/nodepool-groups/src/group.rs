//! A single resource group: a set of nodes and a declared capacity.
//!
//! Administrative operations (`assign_node` / `unassign_node`) move the
//! declared capacity together with membership. Liveness operations
//! (`handle_node_up` / `handle_node_down`) only reconcile membership
//! against the capacity already declared.
//!
//! A group does no locking of its own; the owning manager serializes
//! access.

use std::collections::BTreeSet;

use nodepool_state::{NodeId, ResourceGroupRecord};

use crate::error::{ResourceError, ResourceResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroup {
    nodes: BTreeSet<NodeId>,
    capacity: i32,
}

impl ResourceGroup {
    /// Create an empty group with the given target size.
    pub fn new(capacity: i32) -> Self {
        Self {
            nodes: BTreeSet::new(),
            capacity,
        }
    }

    /// Administratively add a node, growing capacity by one.
    pub(crate) fn assign_node(&mut self, id: NodeId) -> ResourceResult<()> {
        if !self.nodes.insert(id) {
            return Err(ResourceError::NodeAlreadyAssigned(id));
        }
        self.capacity += 1;
        Ok(())
    }

    /// Administratively remove a node, shrinking capacity by one.
    /// Removing a non-member is a no-op.
    pub(crate) fn unassign_node(&mut self, id: NodeId) -> ResourceResult<()> {
        if self.nodes.remove(&id) {
            self.capacity -= 1;
        }
        Ok(())
    }

    /// Admit a node that came up, without touching capacity.
    ///
    /// Fails with `GroupFull` when the group has no slack.
    pub(crate) fn handle_node_up(&mut self, id: NodeId) -> ResourceResult<()> {
        if self.lack_of_nodes() <= 0 {
            return Err(ResourceError::GroupFull);
        }
        self.admit_node(id)
    }

    /// Drop a node that went away, without touching capacity.
    /// Returns whether it was a member.
    pub(crate) fn handle_node_down(&mut self, id: NodeId) -> bool {
        self.nodes.remove(&id)
    }

    /// Insert a member ignoring capacity. Used for the default group and
    /// for replaying persisted membership.
    pub(crate) fn admit_node(&mut self, id: NodeId) -> ResourceResult<()> {
        if !self.nodes.insert(id) {
            return Err(ResourceError::NodeAlreadyAssigned(id));
        }
        Ok(())
    }

    /// `capacity - |nodes|`; negative when the group is over capacity.
    pub fn lack_of_nodes(&self) -> i32 {
        self.capacity - self.nodes.len() as i32
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Members in ascending id order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.nodes.iter().copied().collect()
    }

    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Durable form of this group under `name`.
    pub fn to_record(&self, name: &str) -> ResourceGroupRecord {
        ResourceGroupRecord::new(name, self.capacity, self.nodes())
    }
}
