//! nodepool-groups — resource group membership for a compute cluster.
//!
//! Partitions the cluster's worker nodes into named, capacity-bounded
//! resource groups. Every administrative mutation is persisted through a
//! [`GroupStore`] before it is applied in memory, and node liveness is
//! reconciled against a [`NodeRegistry`] before a group's membership is
//! inspected.
//!
//! # Components
//!
//! - **`group`** — a single group: node set plus declared capacity
//! - **`manager`** — the [`ResourceManager`] owning every group behind one lock
//! - **`selector`** — pluggable choice of which nodes to move
//! - **`store`** / **`registry`** — collaborator seams
//! - **`replica`** — read-only replica view for drift checks

pub mod error;
pub mod group;
pub mod manager;
pub mod registry;
pub mod replica;
pub mod selector;
pub mod store;

pub use error::{ErrorKind, ResourceError, ResourceResult};
pub use group::ResourceGroup;
pub use manager::{
    AutoRecoverOutcome, DEFAULT_RESOURCE_GROUP, DEFAULT_RESOURCE_GROUP_CAPACITY,
    MAX_RESOURCE_GROUPS, ResourceManager,
};
pub use registry::NodeRegistry;
pub use replica::Replica;
pub use selector::{FirstNodes, NodeSelector};
pub use store::GroupStore;
