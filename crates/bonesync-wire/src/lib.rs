//! BoneSync Wire Protocol - Frame encoding and decoding
//!
//! A frame batches the channel writes of one publish cycle, in write order.
//! All integers and floats are little endian.

pub mod frame;
pub mod message;

pub use frame::*;
pub use message::*;
