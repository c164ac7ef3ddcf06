//! Error types for resource group management.

use nodepool_state::{NodeId, StateError};
use thiserror::Error;

/// Result type alias for resource group operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Coarse classification of a [`ResourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Full,
    Empty,
    InvalidArgument,
    LimitExceeded,
    Stopped,
    PersistenceFailure,
    Forbidden,
    /// Memory and store disagree; the process must restart and recover.
    Internal,
}

/// Errors returned by [`ResourceGroup`](crate::ResourceGroup) and
/// [`ResourceManager`](crate::ResourceManager) operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource group {0} doesn't exist")]
    GroupNotFound(String),

    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("resource group {0} already exists")]
    GroupAlreadyExists(String),

    #[error("node {0} already assigned to a resource group")]
    NodeAlreadyAssigned(NodeId),

    #[error("node {0} hasn't been assigned to any resource group")]
    NodeNotAssigned(NodeId),

    #[error("resource group is full")]
    GroupFull,

    #[error("resource group {0} is empty")]
    GroupEmpty(String),

    #[error("not enough nodes in resource group {0}")]
    NodesNotEnough(String),

    #[error("resource group name couldn't be empty")]
    EmptyName,

    #[error("cannot transfer node from resource group {0} to itself")]
    TransferToSelf(String),

    #[error("resource group num reach limit {0}")]
    GroupLimit(usize),

    #[error("node {0} has been stopped")]
    NodeStopped(NodeId),

    #[error("delete default resource group is not permitted")]
    DeleteDefaultGroup,

    #[error("delete non-empty resource group {0} is not permitted")]
    DeleteNonEmptyGroup(String),

    #[error("failed to persist resource group: {0}")]
    Persistence(#[source] StateError),

    #[error("failed to recover resource groups from store: {0}")]
    Recover(#[source] StateError),

    #[error("{op} on resource group {group} diverged from store after commit: {source}")]
    Inconsistent {
        op: &'static str,
        group: String,
        #[source]
        source: Box<ResourceError>,
    },

    #[error("auto recover stopped after {recovered} of {needed} nodes: {source}")]
    AutoRecover {
        needed: usize,
        recovered: usize,
        #[source]
        source: Box<ResourceError>,
    },
}

impl ResourceError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::GroupNotFound(_) | Self::NodeNotFound(_) | Self::NodeNotAssigned(_) => {
                ErrorKind::NotFound
            }
            Self::GroupAlreadyExists(_) | Self::NodeAlreadyAssigned(_) => {
                ErrorKind::AlreadyExists
            }
            Self::GroupFull => ErrorKind::Full,
            Self::GroupEmpty(_) | Self::NodesNotEnough(_) => ErrorKind::Empty,
            Self::EmptyName | Self::TransferToSelf(_) => ErrorKind::InvalidArgument,
            Self::GroupLimit(_) => ErrorKind::LimitExceeded,
            Self::NodeStopped(_) => ErrorKind::Stopped,
            Self::Persistence(_) | Self::Recover(_) => ErrorKind::PersistenceFailure,
            Self::DeleteDefaultGroup | Self::DeleteNonEmptyGroup(_) => ErrorKind::Forbidden,
            Self::Inconsistent { .. } => ErrorKind::Internal,
            Self::AutoRecover { source, .. } => source.kind(),
        }
    }
}
