//! Attachment links between instances
//!
//! A link connects a child instance to an already-evaluated parent:
//! - [`AttachmentLink::Mirror`] reuses the parent's bone matrices as-is
//!   (armor, helm and other equipment skinned to the body skeleton)
//! - [`AttachmentLink::Socket`] anchors the child's root at one parent bone
//!   while the child keeps animating its own skeleton (wings, held weapons)

use glam::{Mat4, Quat, Vec3};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// How a child instance derives its pose from its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum AttachmentLink {
    /// Share the parent's bone matrices; no playback of its own
    Mirror,
    /// Own skeleton and playback, root placed at this parent bone
    Socket(usize),
}

impl AttachmentLink {
    /// Check if this link shares the parent's matrices
    pub fn is_mirror(&self) -> bool {
        matches!(self, Self::Mirror)
    }

    /// Parent bone used as anchor, for socket links
    pub fn socket_bone(&self) -> Option<usize> {
        match self {
            Self::Socket(bone) => Some(*bone),
            Self::Mirror => None,
        }
    }
}

/// Root placement derived from a parent bone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocketPlacement {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl SocketPlacement {
    /// Placement at the origin with no rotation
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };
}

/// Decompose the parent's bone into a world placement for a socket child
///
/// `parent_root` is the parent instance's root transform and `bone_world`
/// the bone's model-space matrix. Scale is discarded; non-finite results
/// fall back to the identity placement.
pub fn decompose_socket(parent_root: Mat4, bone_world: Mat4) -> SocketPlacement {
    let (_scale, rotation, translation) = (parent_root * bone_world).to_scale_rotation_translation();

    if translation.is_finite() && rotation.is_finite() {
        SocketPlacement {
            translation,
            rotation: rotation.normalize(),
        }
    } else {
        log::warn!("Socket bone decomposed to a non-finite placement, using identity");
        SocketPlacement::IDENTITY
    }
}
