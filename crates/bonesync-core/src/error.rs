//! Error types for BoneSync

use thiserror::Error;

/// Core BoneSync errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoneSyncError {
    // Setup errors
    #[error("Bone count mismatch: expected {expected}, got {actual}")]
    BoneCountMismatch { expected: usize, actual: usize },

    #[error("Unknown hierarchy node: {0}")]
    UnknownNode(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Link errors
    #[error("Link is not active")]
    LinkInactive,

    #[error("Link is already active")]
    AlreadyActive,

    // Channel errors
    #[error("Channel index out of range: index {index}, count {count}")]
    ChannelIndexOutOfRange { index: usize, count: usize },

    #[error("Structural channel write on a started link: {0}")]
    StructuralWrite(String),

    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(u8),
}

/// Result type for BoneSync operations
pub type BoneSyncResult<T> = Result<T, BoneSyncError>;
