//! Resource manager — owns every resource group behind a single lock.
//!
//! Every administrative mutation is written to the [`GroupStore`] first
//! and applied in memory only after the store acknowledged it. Liveness
//! events (`handle_node_up` / `handle_node_down`) are applied in memory
//! only; the next administrative write of the group persists them. A write
//! that places a node elsewhere also clears it from any stored record that
//! still lists it, so a restart never replays a stale placement.
//!
//! Before a group's membership is inspected, nodes the [`NodeRegistry`]
//! no longer knows are dropped from it. Because of that self-healing step,
//! `get_nodes`, `contains_node`, `get_resource_group` and
//! `check_lack_of_node` take the write lock even though callers see them
//! as queries.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use nodepool_state::{NodeId, ResourceGroupRecord};
use tracing::{debug, error, info, warn};

use crate::error::{ResourceError, ResourceResult};
use crate::group::ResourceGroup;
use crate::registry::NodeRegistry;
use crate::replica::Replica;
use crate::selector::{FirstNodes, NodeSelector};
use crate::store::GroupStore;

/// Name of the group every new node lands in. It always exists.
pub const DEFAULT_RESOURCE_GROUP: &str = "__default_resource_group";

/// Bootstrap capacity of the default group. Not enforced on admission.
pub const DEFAULT_RESOURCE_GROUP_CAPACITY: i32 = 1_000_000;

/// Upper bound on the number of named resource groups. The default group
/// is not counted.
pub const MAX_RESOURCE_GROUPS: usize = 1024;

type Groups = HashMap<String, ResourceGroup>;

/// Result of [`ResourceManager::auto_recover_resource_group`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoRecoverOutcome {
    /// Nodes the group lacked after reconciliation.
    pub needed: usize,
    /// Nodes actually moved out of the default group.
    pub recovered: Vec<NodeId>,
}

pub struct ResourceManager {
    groups: RwLock<Groups>,
    store: Arc<dyn GroupStore>,
    registry: Arc<dyn NodeRegistry>,
    selector: Arc<dyn NodeSelector>,
}

impl ResourceManager {
    /// Create a manager holding only the default group.
    ///
    /// Call [`recover`](Self::recover) before serving any other operation.
    pub fn new(store: Arc<dyn GroupStore>, registry: Arc<dyn NodeRegistry>) -> Self {
        Self {
            groups: RwLock::new(bootstrap_groups()),
            store,
            registry,
            selector: Arc::new(FirstNodes),
        }
    }

    /// Replace the node selection strategy used by transfer and auto-recover.
    pub fn with_selector(mut self, selector: Arc<dyn NodeSelector>) -> Self {
        self.selector = selector;
        self
    }

    // ── Group lifecycle ────────────────────────────────────────────

    /// Create an empty, zero-capacity resource group.
    pub fn add_resource_group(&self, name: &str) -> ResourceResult<()> {
        let mut groups = self.groups.write().expect("resource groups lock");
        if name.is_empty() {
            return Err(ResourceError::EmptyName);
        }
        if groups.contains_key(name) {
            return Err(ResourceError::GroupAlreadyExists(name.to_string()));
        }
        // The default group is always present and not counted.
        if groups.len() > MAX_RESOURCE_GROUPS {
            return Err(ResourceError::GroupLimit(MAX_RESOURCE_GROUPS));
        }

        let group = ResourceGroup::new(0);
        self.persist(&[group.to_record(name)]).inspect_err(|e| {
            warn!(rg = %name, error = %e, "failed to add resource group");
        })?;
        groups.insert(name.to_string(), group);

        info!(rg = %name, "add resource group");
        Ok(())
    }

    /// Delete a resource group whose capacity has been drained to zero.
    ///
    /// Removing a group that does not exist succeeds.
    pub fn remove_resource_group(&self, name: &str) -> ResourceResult<()> {
        let mut groups = self.groups.write().expect("resource groups lock");
        if name == DEFAULT_RESOURCE_GROUP {
            return Err(ResourceError::DeleteDefaultGroup);
        }
        let Some(group) = groups.get(name) else {
            return Ok(());
        };
        if group.capacity() != 0 {
            return Err(ResourceError::DeleteNonEmptyGroup(name.to_string()));
        }

        self.store.remove_resource_group(name).map_err(|e| {
            warn!(rg = %name, error = %e, "failed to remove resource group");
            ResourceError::Persistence(e)
        })?;
        groups.remove(name);

        info!(rg = %name, "remove resource group");
        Ok(())
    }

    // ── Administrative membership ──────────────────────────────────

    /// Assign a live node to a group, growing its capacity by one.
    pub fn assign_node(&self, rg: &str, node: NodeId) -> ResourceResult<()> {
        let mut groups = self.groups.write().expect("resource groups lock");
        if !groups.contains_key(rg) {
            return Err(ResourceError::GroupNotFound(rg.to_string()));
        }
        self.check_node_alive(node)?;

        self.check_node_status(&mut groups, rg);
        if find_group_of(&groups, node).is_some() {
            return Err(ResourceError::NodeAlreadyAssigned(node));
        }

        let group = group_mut(&mut groups, rg)?;
        let mut record = group.to_record(rg);
        record.nodes.push(node);
        record.capacity += 1;
        self.persist_placement(node, vec![record]).inspect_err(|e| {
            warn!(rg, node, error = %e, "failed to add node to resource group");
        })?;

        group
            .assign_node(node)
            .map_err(|e| diverged("assign node", rg, e))?;

        info!(rg, node, "add node to resource group");
        Ok(())
    }

    /// Assign a live node to `rg`, taking it out of the default group if
    /// liveness placed it there.
    ///
    /// Both groups are committed in a single write: the default group
    /// shrinks by one, `rg` grows by one. Nodes in any other group are
    /// rejected as with [`assign_node`](Self::assign_node).
    pub fn claim_node(&self, rg: &str, node: NodeId) -> ResourceResult<()> {
        let mut groups = self.groups.write().expect("resource groups lock");
        if !groups.contains_key(rg) {
            return Err(ResourceError::GroupNotFound(rg.to_string()));
        }
        self.check_node_alive(node)?;

        self.check_node_status(&mut groups, rg);
        self.check_node_status(&mut groups, DEFAULT_RESOURCE_GROUP);
        let from_default = rg != DEFAULT_RESOURCE_GROUP
            && group_ref(&groups, DEFAULT_RESOURCE_GROUP)?.contains_node(node);
        if !from_default && find_group_of(&groups, node).is_some() {
            return Err(ResourceError::NodeAlreadyAssigned(node));
        }

        let mut records = Vec::with_capacity(2);
        if from_default {
            let mut default_record =
                group_ref(&groups, DEFAULT_RESOURCE_GROUP)?.to_record(DEFAULT_RESOURCE_GROUP);
            default_record.nodes.retain(|&id| id != node);
            default_record.capacity -= 1;
            records.push(default_record);
        }
        let mut record = group_ref(&groups, rg)?.to_record(rg);
        record.nodes.push(node);
        record.capacity += 1;
        records.push(record);
        self.persist_placement(node, records).inspect_err(|e| {
            warn!(rg, node, error = %e, "failed to claim node for resource group");
        })?;

        if from_default {
            group_mut(&mut groups, DEFAULT_RESOURCE_GROUP)?
                .unassign_node(node)
                .map_err(|e| diverged("claim node", DEFAULT_RESOURCE_GROUP, e))?;
        }
        group_mut(&mut groups, rg)?
            .assign_node(node)
            .map_err(|e| diverged("claim node", rg, e))?;

        info!(rg, node, from_default, "claim node for resource group");
        Ok(())
    }

    /// Remove a node from a group, shrinking its capacity by one.
    ///
    /// Unassigning a node that is unknown or not a member succeeds
    /// without touching the store.
    pub fn unassign_node(&self, rg: &str, node: NodeId) -> ResourceResult<()> {
        let mut groups = self.groups.write().expect("resource groups lock");
        if !groups.contains_key(rg) {
            return Err(ResourceError::GroupNotFound(rg.to_string()));
        }

        self.check_node_status(&mut groups, rg);
        let group = group_mut(&mut groups, rg)?;
        if !group.contains_node(node) {
            return Ok(());
        }

        let mut record = group.to_record(rg);
        record.nodes.retain(|&id| id != node);
        record.capacity -= 1;
        self.persist(&[record]).inspect_err(|e| {
            warn!(rg, node, error = %e, "failed to remove node from resource group");
        })?;

        group
            .unassign_node(node)
            .map_err(|e| diverged("unassign node", rg, e))?;

        info!(rg, node, "remove node from resource group");
        Ok(())
    }

    // ── Rebalancing ────────────────────────────────────────────────

    /// Move one node from `from` to `to`, adjusting both capacities.
    ///
    /// The node is picked by the configured [`NodeSelector`]. Both groups
    /// are committed to the store in a single write. Returns the moved node.
    pub fn transfer_node(&self, from: &str, to: &str) -> ResourceResult<NodeId> {
        let mut groups = self.groups.write().expect("resource groups lock");
        for name in [from, to] {
            if !groups.contains_key(name) {
                return Err(ResourceError::GroupNotFound(name.to_string()));
            }
        }
        if from == to {
            return Err(ResourceError::TransferToSelf(from.to_string()));
        }

        self.check_node_status(&mut groups, from);
        self.check_node_status(&mut groups, to);

        let candidates = group_ref(&groups, from)?.nodes();
        if candidates.is_empty() {
            return Err(ResourceError::GroupEmpty(from.to_string()));
        }
        let node = pick(self.selector.as_ref(), &candidates, 1)
            .first()
            .copied()
            .ok_or_else(|| ResourceError::NodesNotEnough(from.to_string()))?;

        let mut from_record = group_ref(&groups, from)?.to_record(from);
        from_record.nodes.retain(|&id| id != node);
        from_record.capacity -= 1;
        let mut to_record = group_ref(&groups, to)?.to_record(to);
        to_record.nodes.push(node);
        to_record.capacity += 1;
        self.persist_placement(node, vec![from_record, to_record]).inspect_err(|e| {
            warn!(from, to, node, error = %e, "failed to transfer node");
        })?;

        group_mut(&mut groups, from)?
            .unassign_node(node)
            .map_err(|e| diverged("transfer node", from, e))?;
        group_mut(&mut groups, to)?
            .assign_node(node)
            .map_err(|e| diverged("transfer node", to, e))?;

        info!(from, to, node, "transfer node between resource groups");
        Ok(node)
    }

    /// Fill a group's missing capacity with nodes from the default group.
    ///
    /// Each node move is committed on its own (default group and target in
    /// one write). A failed move does not stop the remaining ones; the
    /// first failure is reported once every candidate has been tried.
    /// A move that fails in memory after its commit aborts immediately.
    pub fn auto_recover_resource_group(&self, rg: &str) -> ResourceResult<AutoRecoverOutcome> {
        let mut groups = self.groups.write().expect("resource groups lock");
        if !groups.contains_key(rg) {
            return Err(ResourceError::GroupNotFound(rg.to_string()));
        }
        if rg == DEFAULT_RESOURCE_GROUP {
            return Ok(AutoRecoverOutcome {
                needed: 0,
                recovered: Vec::new(),
            });
        }

        self.check_node_status(&mut groups, rg);
        self.check_node_status(&mut groups, DEFAULT_RESOURCE_GROUP);

        let needed = group_ref(&groups, rg)?.lack_of_nodes().max(0) as usize;
        let candidates = group_ref(&groups, DEFAULT_RESOURCE_GROUP)?.nodes();
        let chosen = pick(self.selector.as_ref(), &candidates, needed);

        let mut recovered = Vec::with_capacity(chosen.len());
        let mut first_error = None;
        for node in chosen {
            match self.move_from_default(&mut groups, rg, node) {
                Ok(()) => recovered.push(node),
                Err(e @ ResourceError::Inconsistent { .. }) => {
                    return Err(ResourceError::AutoRecover {
                        needed,
                        recovered: recovered.len(),
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(rg, node, error = %e, "failed to recover node into resource group");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(ResourceError::AutoRecover {
                needed,
                recovered: recovered.len(),
                source: Box::new(e),
            });
        }

        info!(rg, needed, recovered = recovered.len(), "auto recover resource group");
        Ok(AutoRecoverOutcome { needed, recovered })
    }

    fn move_from_default(&self, groups: &mut Groups, rg: &str, node: NodeId) -> ResourceResult<()> {
        let mut default_record =
            group_ref(groups, DEFAULT_RESOURCE_GROUP)?.to_record(DEFAULT_RESOURCE_GROUP);
        default_record.nodes.retain(|&id| id != node);
        default_record.capacity -= 1;
        let mut target_record = group_ref(groups, rg)?.to_record(rg);
        target_record.nodes.push(node);
        self.persist_placement(node, vec![default_record, target_record])?;

        group_mut(groups, DEFAULT_RESOURCE_GROUP)?
            .unassign_node(node)
            .map_err(|e| diverged("auto recover", DEFAULT_RESOURCE_GROUP, e))?;
        group_mut(groups, rg)?
            .handle_node_up(node)
            .map_err(|e| diverged("auto recover", rg, e))?;

        info!(rg, node, "move node from default resource group");
        Ok(())
    }

    // ── Liveness events ────────────────────────────────────────────

    /// Place a node that came up. Returns the group it belongs to.
    ///
    /// A node already in a group stays there; otherwise it joins the
    /// default group, whose capacity is not enforced.
    pub fn handle_node_up(&self, node: NodeId) -> ResourceResult<String> {
        let mut groups = self.groups.write().expect("resource groups lock");
        self.check_node_alive(node)?;

        if let Some(rg) = find_group_of(&groups, node) {
            info!(rg = %rg, node, "node up: already assigned to resource group");
            return Ok(rg);
        }

        group_mut(&mut groups, DEFAULT_RESOURCE_GROUP)?.admit_node(node)?;
        info!(rg = DEFAULT_RESOURCE_GROUP, node, "node up: assign node to default resource group");
        Ok(DEFAULT_RESOURCE_GROUP.to_string())
    }

    /// Drop a node that went down from its group. Returns the group name.
    pub fn handle_node_down(&self, node: NodeId) -> ResourceResult<String> {
        let mut groups = self.groups.write().expect("resource groups lock");
        if self.registry.get(node).is_none() {
            return Err(ResourceError::NodeNotFound(node));
        }

        let rg = find_group_of(&groups, node).ok_or(ResourceError::NodeNotAssigned(node))?;
        group_mut(&mut groups, &rg)?.handle_node_down(node);
        info!(rg = %rg, node, "node down: remove node from resource group");
        Ok(rg)
    }

    // ── Bootstrap ──────────────────────────────────────────────────

    /// Rebuild all in-memory groups from the store.
    ///
    /// Existing in-memory state is discarded. Persisted capacity and
    /// membership are restored as recorded; a node listed by more than one
    /// group stays in the first group (by name) that lists it.
    pub fn recover(&self) -> ResourceResult<()> {
        let mut groups = self.groups.write().expect("resource groups lock");
        let records = self
            .store
            .list_resource_groups()
            .map_err(ResourceError::Recover)?;

        let mut rebuilt = bootstrap_groups();
        for record in records {
            let capacity = if record.name == DEFAULT_RESOURCE_GROUP {
                record.capacity.max(DEFAULT_RESOURCE_GROUP_CAPACITY)
            } else {
                record.capacity
            };
            let mut group = ResourceGroup::new(capacity);
            for &node in &record.nodes {
                if let Some(owner) = find_group_of(&rebuilt, node) {
                    warn!(
                        rg = %record.name,
                        node,
                        owner = %owner,
                        "node recorded in multiple resource groups, skipping"
                    );
                    continue;
                }
                if group.admit_node(node).is_err() {
                    warn!(rg = %record.name, node, "duplicate node in resource group record, skipping");
                }
            }
            info!(
                rg = %record.name,
                nodes = ?record.nodes,
                capacity = record.capacity,
                "recover resource group"
            );
            rebuilt.insert(record.name, group);
        }

        *groups = rebuilt;
        let names: Vec<String> = groups.keys().cloned().collect();
        for name in &names {
            self.check_node_status(&mut groups, name);
        }
        Ok(())
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Live members of a group, after dropping nodes that went away.
    pub fn get_nodes(&self, rg: &str) -> ResourceResult<Vec<NodeId>> {
        let mut groups = self.groups.write().expect("resource groups lock");
        if !groups.contains_key(rg) {
            return Err(ResourceError::GroupNotFound(rg.to_string()));
        }
        self.check_node_status(&mut groups, rg);
        Ok(group_ref(&groups, rg)?.nodes())
    }

    /// Whether `node` is a live member of `rg`. False for unknown groups.
    pub fn contains_node(&self, rg: &str, node: NodeId) -> bool {
        let mut groups = self.groups.write().expect("resource groups lock");
        if !groups.contains_key(rg) {
            return false;
        }
        self.check_node_status(&mut groups, rg);
        groups.get(rg).is_some_and(|g| g.contains_node(node))
    }

    pub fn contains_resource_group(&self, rg: &str) -> bool {
        let groups = self.groups.read().expect("resource groups lock");
        groups.contains_key(rg)
    }

    /// Snapshot of a group, after dropping nodes that went away.
    pub fn get_resource_group(&self, rg: &str) -> ResourceResult<ResourceGroup> {
        let mut groups = self.groups.write().expect("resource groups lock");
        if !groups.contains_key(rg) {
            return Err(ResourceError::GroupNotFound(rg.to_string()));
        }
        self.check_node_status(&mut groups, rg);
        group_ref(&groups, rg).cloned()
    }

    /// All group names, sorted.
    pub fn list_resource_groups(&self) -> Vec<String> {
        let groups = self.groups.read().expect("resource groups lock");
        let mut names: Vec<String> = groups.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn find_resource_group_by_node(&self, node: NodeId) -> ResourceResult<String> {
        let groups = self.groups.read().expect("resource groups lock");
        find_group_of(&groups, node).ok_or(ResourceError::NodeNotAssigned(node))
    }

    /// Nodes of `replica` that are no longer members of its resource group.
    pub fn check_outbound_nodes(&self, replica: &Replica) -> BTreeSet<NodeId> {
        let groups = self.groups.read().expect("resource groups lock");
        let Some(group) = groups.get(&replica.resource_group) else {
            return BTreeSet::new();
        };

        replica
            .nodes
            .iter()
            .copied()
            .filter(|&node| !group.contains_node(node))
            .collect()
    }

    /// Count of `replica`'s outbound nodes per group they now belong to.
    ///
    /// Outbound nodes that are in no group are not counted.
    pub fn get_outgoing_node_num_by_replica(&self, replica: &Replica) -> HashMap<String, i32> {
        let groups = self.groups.read().expect("resource groups lock");
        let mut counts = HashMap::new();
        let Some(group) = groups.get(&replica.resource_group) else {
            return counts;
        };

        for &node in &replica.nodes {
            if group.contains_node(node) {
                continue;
            }
            if let Some(rg) = find_group_of(&groups, node) {
                *counts.entry(rg).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Missing nodes of `rg` after dropping nodes that went away.
    /// Zero for unknown groups.
    pub fn check_lack_of_node(&self, rg: &str) -> i32 {
        let mut groups = self.groups.write().expect("resource groups lock");
        if !groups.contains_key(rg) {
            return 0;
        }
        self.check_node_status(&mut groups, rg);
        groups.get(rg).map_or(0, ResourceGroup::lack_of_nodes)
    }

    // ── Internals ──────────────────────────────────────────────────

    fn check_node_alive(&self, node: NodeId) -> ResourceResult<()> {
        if self.registry.get(node).is_none() {
            return Err(ResourceError::NodeNotFound(node));
        }
        if self.registry.is_stopping(node) {
            return Err(ResourceError::NodeStopped(node));
        }
        Ok(())
    }

    /// Drop members of `rg` the registry no longer knows. Capacity is kept.
    fn check_node_status(&self, groups: &mut Groups, rg: &str) {
        let Some(group) = groups.get_mut(rg) else {
            return;
        };
        for node in group.nodes() {
            if self.registry.get(node).is_none() && group.handle_node_down(node) {
                warn!(rg, node, "found node down, remove it");
            }
        }
    }

    fn persist(&self, records: &[ResourceGroupRecord]) -> ResourceResult<()> {
        self.store
            .save_resource_groups(records)
            .map_err(ResourceError::Persistence)
    }

    /// Save `records` together with every other stored record that still
    /// lists `node`, minus that node. Capacity of those records is kept.
    fn persist_placement(
        &self,
        node: NodeId,
        mut records: Vec<ResourceGroupRecord>,
    ) -> ResourceResult<()> {
        let stored = self
            .store
            .list_resource_groups()
            .map_err(ResourceError::Persistence)?;
        for mut stale in stored {
            if !stale.nodes.contains(&node) || records.iter().any(|r| r.name == stale.name) {
                continue;
            }
            stale.nodes.retain(|&id| id != node);
            debug!(rg = %stale.name, node, "clear stale node from stored resource group");
            records.push(stale);
        }
        self.persist(&records)
    }
}

fn bootstrap_groups() -> Groups {
    let mut groups = HashMap::new();
    groups.insert(
        DEFAULT_RESOURCE_GROUP.to_string(),
        ResourceGroup::new(DEFAULT_RESOURCE_GROUP_CAPACITY),
    );
    groups
}

fn find_group_of(groups: &Groups, node: NodeId) -> Option<String> {
    groups
        .iter()
        .find(|(_, group)| group.contains_node(node))
        .map(|(name, _)| name.clone())
}

fn group_ref<'a>(groups: &'a Groups, rg: &str) -> ResourceResult<&'a ResourceGroup> {
    groups
        .get(rg)
        .ok_or_else(|| ResourceError::GroupNotFound(rg.to_string()))
}

fn group_mut<'a>(groups: &'a mut Groups, rg: &str) -> ResourceResult<&'a mut ResourceGroup> {
    groups
        .get_mut(rg)
        .ok_or_else(|| ResourceError::GroupNotFound(rg.to_string()))
}

/// Ask the selector, keeping only distinct candidates and at most `count`.
fn pick(selector: &dyn NodeSelector, candidates: &[NodeId], count: usize) -> Vec<NodeId> {
    if count == 0 {
        return Vec::new();
    }
    let mut seen = BTreeSet::new();
    selector
        .select(candidates, count)
        .into_iter()
        .filter(|node| candidates.contains(node) && seen.insert(*node))
        .take(count)
        .collect()
}

/// The store already holds the new state but memory could not follow.
fn diverged(op: &'static str, rg: &str, source: ResourceError) -> ResourceError {
    error!(op, rg, error = %source, "in-memory resource group diverged from store, restart and recover required");
    ResourceError::Inconsistent {
        op,
        group: rg.to_string(),
        source: Box::new(source),
    }
}
