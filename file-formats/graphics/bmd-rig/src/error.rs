use std::io;
use thiserror::Error;

/// Error types for rig loading, composition and evaluation diagnostics
///
/// Only load and composition operations return these as `Err`. Faults found
/// while evaluating a pose are recovered in place and reported through
/// `log::warn!` using the same variants for formatting.
#[derive(Error, Debug)]
pub enum RigError {
    /// I/O error while reading an asset
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested asset does not exist in the source
    #[error("Asset missing: {0}")]
    AssetMissing(String),

    /// The asset exists but could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Structural problem in the bone list or tracks
    #[error("Malformed rig: bone {bone}: {reason}")]
    MalformedRig { bone: usize, reason: String },

    /// Requested action does not exist in the model
    #[error("Action index {index} out of range ({count} actions), using action 0")]
    ActionIndexOutOfRange { index: usize, count: usize },

    /// Action with one frame or fewer; pose is frozen
    #[error("Action {action} has {frame_count} frame(s); pose is frozen")]
    DegenerateAction { action: usize, frame_count: usize },

    /// Evaluation produced NaN or infinity
    #[error("Non-finite matrix for bone {bone} in action {action}, substituted identity")]
    NumericNonFinite { bone: usize, action: usize },

    /// Handle does not refer to a live instance
    #[error("Invalid instance handle: {0}")]
    InvalidHandle(String),

    /// Linking would make an instance its own ancestor
    #[error("Attachment cycle: {0}")]
    AttachmentCycle(String),

    /// Child already has a parent link
    #[error("Instance already attached: {0}")]
    AlreadyAttached(String),

    /// Socket bone outside the parent's skeleton
    #[error("Socket bone {bone} out of range ({count} bones)")]
    SocketOutOfRange { bone: usize, count: usize },

    /// No spawn recipe registered for this type id
    #[error("Unknown spawn type: {0}")]
    UnknownSpawnType(u32),

    /// Operation needs a loaded instance
    #[error("Instance is not ready: {0}")]
    NotReady(String),
}

/// Result type using RigError
pub type Result<T> = std::result::Result<T, RigError>;
