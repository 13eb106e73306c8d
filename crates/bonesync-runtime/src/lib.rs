//! BoneSync Runtime - Node orchestration
//!
//! Authority tick:
//! 1. Sample the source skeleton when a send is due
//! 2. Publish changed fields on the pose channels
//! 3. Build one frame from everything published
//! 4. Schedule transmission (handled externally via `pop_outgoing`)
//!
//! Observer tick:
//! 1. Ingest queued frames
//! 2. Apply channel writes in order
//! 3. Start the link once the initial full sync is in
//! 4. Assemble, interpolate and apply the delayed pose

pub mod config;
pub mod node;
pub mod telemetry;

pub use config::*;
pub use node::*;
pub use telemetry::*;
