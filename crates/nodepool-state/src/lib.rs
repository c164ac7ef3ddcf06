//! nodepool-state — embedded state store for nodepool.
//!
//! Backed by [redb](https://docs.rs/redb), persists resource group
//! definitions and the node registry.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Resource groups are keyed by name, nodes by their numeric id.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared between the resource manager and the node registry.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
