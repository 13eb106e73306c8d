//! BoneSync Time - Clocks and publish scheduling
//!
//! This crate provides:
//! - The `Clock` abstraction both link roles are handed explicitly
//! - A monotonic wall clock and a manually driven clock for simulation
//! - The additive fixed-cadence send schedule used by the authority

pub mod clock;
pub mod schedule;

pub use clock::*;
pub use schedule::*;
