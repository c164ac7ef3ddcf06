//! StateStore — redb-backed persistence for nodepool.
//!
//! Provides typed operations over resource group records and registered
//! nodes. All values are JSON-serialized into redb's `&[u8]` value
//! columns. The store supports both on-disk and in-memory backends (the
//! latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(RESOURCE_GROUPS).map_err(map_err!(Table))?;
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Resource groups ────────────────────────────────────────────

    /// Insert or replace one or more resource group records.
    ///
    /// All records are written in a single write transaction: either every
    /// record is committed or none is.
    pub fn save_resource_groups(&self, records: &[ResourceGroupRecord]) -> StateResult<()> {
        let mut encoded = Vec::with_capacity(records.len());
        for record in records {
            let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
            encoded.push((record.name.as_str(), value));
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RESOURCE_GROUPS).map_err(map_err!(Table))?;
            for (name, value) in &encoded {
                table
                    .insert(*name, value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count = records.len(), "resource groups stored");
        Ok(())
    }

    /// Get a resource group record by name.
    pub fn get_resource_group(&self, name: &str) -> StateResult<Option<ResourceGroupRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RESOURCE_GROUPS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ResourceGroupRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all persisted resource group records, ordered by name.
    pub fn list_resource_groups(&self) -> StateResult<Vec<ResourceGroupRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RESOURCE_GROUPS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ResourceGroupRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Delete a resource group record. Returns true if it existed.
    pub fn remove_resource_group(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(RESOURCE_GROUPS).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%name, existed, "resource group deleted");
        Ok(existed)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node.
    pub fn put_node(&self, node: &NodeInfo) -> StateResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .insert(node.id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a node by id.
    pub fn get_node(&self, id: NodeId) -> StateResult<Option<NodeInfo>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: NodeInfo =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all nodes, ordered by id.
    pub fn list_nodes(&self) -> StateResult<Vec<NodeInfo>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: NodeInfo =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(node);
        }
        Ok(results)
    }

    /// Delete a node by id. Returns true if it existed.
    pub fn delete_node(&self, id: NodeId) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node(id: NodeId) -> NodeInfo {
        NodeInfo {
            id,
            address: format!("10.0.0.{id}:19530"),
            stopping: false,
            last_heartbeat: 1000,
        }
    }

    // ── Resource groups ────────────────────────────────────────────

    #[test]
    fn resource_group_save_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let record = ResourceGroupRecord::new("rg1", 2, vec![1, 2]);

        store.save_resource_groups(&[record.clone()]).unwrap();
        let retrieved = store.get_resource_group("rg1").unwrap();

        assert_eq!(retrieved, Some(record));
    }

    #[test]
    fn resource_group_save_overwrites() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .save_resource_groups(&[ResourceGroupRecord::new("rg1", 0, vec![])])
            .unwrap();
        store
            .save_resource_groups(&[ResourceGroupRecord::new("rg1", 1, vec![7])])
            .unwrap();

        let retrieved = store.get_resource_group("rg1").unwrap().unwrap();
        assert_eq!(retrieved.capacity, 1);
        assert_eq!(retrieved.nodes, vec![7]);
        assert_eq!(store.list_resource_groups().unwrap().len(), 1);
    }

    #[test]
    fn resource_group_multi_record_save() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .save_resource_groups(&[
                ResourceGroupRecord::new("from", 0, vec![]),
                ResourceGroupRecord::new("to", 1, vec![3]),
            ])
            .unwrap();

        let all = store.list_resource_groups().unwrap();
        let names: Vec<_> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["from", "to"]);
    }

    #[test]
    fn resource_group_remove() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .save_resource_groups(&[ResourceGroupRecord::new("rg1", 0, vec![])])
            .unwrap();

        assert!(store.remove_resource_group("rg1").unwrap());
        assert!(!store.remove_resource_group("rg1").unwrap());
        assert!(store.get_resource_group("rg1").unwrap().is_none());
    }

    #[test]
    fn record_without_nodes_field_deserializes() {
        let record: ResourceGroupRecord =
            serde_json::from_str(r#"{"name":"rg1","capacity":0}"#).unwrap();
        assert!(record.nodes.is_empty());
    }

    // ── Nodes ──────────────────────────────────────────────────────

    #[test]
    fn node_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let node = test_node(1);

        store.put_node(&node).unwrap();
        assert_eq!(store.get_node(1).unwrap(), Some(node));
    }

    #[test]
    fn node_list_ordered_by_id() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_node(&test_node(3)).unwrap();
        store.put_node(&test_node(1)).unwrap();
        store.put_node(&test_node(2)).unwrap();

        let ids: Vec<_> = store.list_nodes().unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn node_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_node(&test_node(1)).unwrap();

        assert!(store.delete_node(1).unwrap());
        assert!(!store.delete_node(1).unwrap());
        assert!(store.get_node(1).unwrap().is_none());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store
                .save_resource_groups(&[ResourceGroupRecord::new("rg1", 1, vec![5])])
                .unwrap();
            store.put_node(&test_node(5)).unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        let record = store.get_resource_group("rg1").unwrap().unwrap();
        assert_eq!(record.nodes, vec![5]);
        assert!(store.get_node(5).unwrap().is_some());
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_resource_groups().unwrap().is_empty());
        assert!(store.list_nodes().unwrap().is_empty());
        assert!(store.get_resource_group("nope").unwrap().is_none());
        assert!(!store.remove_resource_group("nope").unwrap());
        assert!(!store.delete_node(42).unwrap());
    }
}
