//! Keyframe interpolation for action tracks

use glam::{Mat4, Quat, Vec3};

use super::player::FrameState;
use crate::model::KeyframeTrack;

/// Interpolated parent-relative transform of one bone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPose {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl LocalPose {
    /// Identity pose
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    /// Create a pose
    pub const fn new(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Rotation matrix with the translation set in the last column
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }
}

impl Default for LocalPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Spherical interpolation that returns the keyframes exactly at the ends
///
/// In between, glam's slerp takes the shorter arc.
pub fn slerp(from: Quat, to: Quat, t: f32) -> Quat {
    if t <= 0.0 {
        from
    } else if t >= 1.0 {
        to
    } else {
        from.slerp(to, t)
    }
}

/// Linear interpolation that returns the keyframes exactly at the ends
pub fn lerp(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    if t <= 0.0 {
        from
    } else if t >= 1.0 {
        to
    } else {
        from.lerp(to, t)
    }
}

/// Interpolate a track at the given frame triple
///
/// Returns `None` when either bracketing keyframe is missing from the track.
pub fn sample_track(track: &KeyframeTrack, frame: &FrameState) -> Option<LocalPose> {
    let (r1, t1) = track.sample(frame.frame_index)?;
    let (r2, t2) = track.sample(frame.next_frame)?;

    Some(LocalPose {
        rotation: slerp(r1, r2, frame.t),
        translation: lerp(t1, t2, frame.t),
    })
}
