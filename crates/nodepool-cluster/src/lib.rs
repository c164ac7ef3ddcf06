//! nodepool-cluster — node liveness for nodepool.
//!
//! Tracks which worker nodes have joined the cluster, when they last
//! heartbeated, and whether they are draining. The [`MembershipManager`]
//! is the [`NodeRegistry`](nodepool_groups::NodeRegistry) the resource
//! manager consults before touching group membership.
//!
//! ```text
//! MembershipManager
//!   ├── join / heartbeat / drain / leave → StateStore (nodes table)
//!   ├── get()         → None once a node left or missed heartbeats
//!   └── is_stopping() → draining flag
//! ```

pub mod membership;

pub use membership::{Member, MemberStatus, MembershipManager};
