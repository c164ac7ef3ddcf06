//! Durable persistence seam used by the resource manager.

use nodepool_state::{ResourceGroupRecord, StateResult, StateStore};

/// Durable storage for resource group records.
///
/// `save_resource_groups` must commit all records atomically; node
/// transfers rely on it to move a node between two groups in one step.
pub trait GroupStore: Send + Sync {
    fn save_resource_groups(&self, records: &[ResourceGroupRecord]) -> StateResult<()>;

    fn remove_resource_group(&self, name: &str) -> StateResult<()>;

    fn list_resource_groups(&self) -> StateResult<Vec<ResourceGroupRecord>>;
}

impl GroupStore for StateStore {
    fn save_resource_groups(&self, records: &[ResourceGroupRecord]) -> StateResult<()> {
        StateStore::save_resource_groups(self, records)
    }

    fn remove_resource_group(&self, name: &str) -> StateResult<()> {
        StateStore::remove_resource_group(self, name).map(|_| ())
    }

    fn list_resource_groups(&self) -> StateResult<Vec<ResourceGroupRecord>> {
        StateStore::list_resource_groups(self)
    }
}
