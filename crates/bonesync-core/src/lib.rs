//! BoneSync Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout the BoneSync workspace:
//! - Math values (Vec3, Quat) and per-bone transforms
//! - Change detection flags (ChangeSet)
//! - Timestamped pose snapshots
//! - Time primitives (StateTime)
//! - Link settings and interpolation policy

pub mod error;
pub mod id;
pub mod math;
pub mod settings;
pub mod snapshot;
pub mod time;
pub mod transform;

pub use error::*;
pub use id::*;
pub use math::*;
pub use settings::*;
pub use snapshot::*;
pub use time::*;
pub use transform::*;
