//! BoneSync Test Harness
//!
//! - Chaos links: seeded jitter and loss, in-order delivery per link
//! - Link simulation: one authority and any number of observers on a shared
//!   manual clock
//! - Deterministic skeleton motion for replay-stable runs
//! - End-to-end replication scenarios

pub mod chaos;
pub mod integration;
pub mod motion;
pub mod simulator;

pub use chaos::*;
pub use integration::*;
pub use motion::*;
pub use simulator::*;
