//! BoneSync Pose - Skeleton pose replication
//!
//! Authority side:
//! - `traverse` fixes the bone index mapping once per link
//! - `PoseEncoder` samples on a fixed cadence and publishes only changed fields
//!
//! Observer side:
//! - `SnapshotAssembler` turns channel notifications into full snapshots
//! - `InterpolationBuffer` renders a deliberately delayed, interpolated pose
//! - `ObserverLink` ties both together and writes the result onto a skeleton

pub mod applier;
pub mod assembler;
pub mod buffer;
pub mod channels;
pub mod encoder;
pub mod hierarchy;
pub mod link;
pub mod sampler;

pub use applier::*;
pub use assembler::*;
pub use buffer::*;
pub use channels::*;
pub use encoder::*;
pub use hierarchy::*;
pub use link::*;
pub use sampler::*;
