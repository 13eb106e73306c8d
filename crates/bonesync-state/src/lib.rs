//! BoneSync State - Replication channels
//!
//! A replication channel is a per-field ordered value store:
//! - `SyncList` is the authority's copy; every write is queued for delivery
//! - `ReplicaList` is an observer's copy; applying a delivered write updates
//!   the latest value and notifies subscribers
//! - Reading either side always returns the last written value, never a delta

pub mod list;
pub mod replica;

pub use list::*;
pub use replica::*;
