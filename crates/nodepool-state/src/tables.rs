//! redb table definitions for the nodepool state store.

use redb::TableDefinition;

/// Resource group records keyed by group name.
pub const RESOURCE_GROUPS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("resource_groups");

/// Registered nodes keyed by node id.
pub const NODES: TableDefinition<i64, &[u8]> = TableDefinition::new("nodes");
