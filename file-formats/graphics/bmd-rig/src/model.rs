//! Rigged model data: bones, actions and per-bone keyframe tracks
//!
//! A [`RiggedModel`] is produced once by the asset loader and then shared
//! read-only (through `Arc`) by every instance that renders it. Nothing in
//! this crate mutates a model after it has been built.

use bitflags::bitflags;
use glam::{Quat, Vec3};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::error::RigError;

/// Parent index used by root bones
pub const ROOT_PARENT: i16 = -1;

/// A node in the rig hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct Bone {
    /// Position of this bone in the model's bone list
    pub index: usize,
    /// Parent bone index (-1 for root bones)
    pub parent: i16,
    /// Bone name as stored in the asset
    pub name: String,
    /// Placeholder bone without animation data
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub dummy: bool,
}

impl Bone {
    /// Create a root bone
    pub fn root(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            parent: ROOT_PARENT,
            name: name.into(),
            dummy: false,
        }
    }

    /// Create a bone parented to `parent`
    ///
    /// Parents beyond the stored `i16` range make the bone a root.
    pub fn child(index: usize, parent: usize, name: impl Into<String>) -> Self {
        let name = name.into();
        let parent = i16::try_from(parent).unwrap_or_else(|_| {
            log::warn!("Bone {index} ({name}): parent {parent} out of range, stored as root");
            ROOT_PARENT
        });
        Self {
            index,
            parent,
            name,
            dummy: false,
        }
    }

    /// Parent index, or `None` for root bones
    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent).ok()
    }

    /// Check if this bone has no parent
    pub fn is_root(&self) -> bool {
        self.parent < 0
    }
}

/// One animation clip
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct Action {
    /// Display name (may be empty)
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub name: String,
    /// Number of keyframes in every track of this action
    pub frame_count: usize,
    /// Frames advanced per second of simulated time
    pub playback_speed: f32,
    /// Pin the root bone's X/Y to frame 0 (movement is driven externally)
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub lock_root_xy: bool,
}

impl Action {
    /// Create an action
    pub fn new(frame_count: usize, playback_speed: f32) -> Self {
        Self {
            name: String::new(),
            frame_count,
            playback_speed,
            lock_root_xy: false,
        }
    }

    /// Set the root lock flag
    pub fn with_root_lock(mut self, lock_root_xy: bool) -> Self {
        self.lock_root_xy = lock_root_xy;
        self
    }

    /// Set the display name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A single-frame (or empty) action is a static pose
    pub fn is_static(&self) -> bool {
        self.frame_count <= 1
    }
}

/// Per-frame rotation and translation samples for one bone in one action
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct KeyframeTrack {
    /// Rotation per frame
    pub rotations: Vec<Quat>,
    /// Translation per frame
    pub translations: Vec<Vec3>,
}

impl KeyframeTrack {
    /// Create a track from per-frame samples
    pub fn new(rotations: Vec<Quat>, translations: Vec<Vec3>) -> Self {
        Self {
            rotations,
            translations,
        }
    }

    /// A track holding the same pose for `frames` frames
    pub fn constant(rotation: Quat, translation: Vec3, frames: usize) -> Self {
        Self {
            rotations: vec![rotation; frames],
            translations: vec![translation; frames],
        }
    }

    /// Number of complete (rotation, translation) samples
    pub fn len(&self) -> usize {
        self.rotations.len().min(self.translations.len())
    }

    /// Check if the track has no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `frame`, if present
    pub fn sample(&self, frame: usize) -> Option<(Quat, Vec3)> {
        Some((*self.rotations.get(frame)?, *self.translations.get(frame)?))
    }
}

bitflags! {
    /// Per-mesh rendering flags supplied by the asset loader
    ///
    /// The core never derives these; it only carries them to the renderer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct MeshFlags: u32 {
        /// Mesh is not drawn
        const HIDDEN = 0x01;
        /// Mesh uses additive blending
        const BLEND = 0x02;
    }
}

/// Mesh entry of a model; one skin buffer is kept per mesh
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct MeshDesc {
    /// Mesh name (usually the texture name)
    pub name: String,
    /// Opaque rendering flags
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub flags: MeshFlags,
}

impl MeshDesc {
    /// Create a mesh entry
    pub fn new(name: impl Into<String>, flags: MeshFlags) -> Self {
        Self {
            name: name.into(),
            flags,
        }
    }
}

/// Immutable parsed rig: bones, actions and `tracks[action][bone]`
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct RiggedModel {
    /// Model name
    pub name: String,
    /// Bones, parents before children
    pub bones: Vec<Bone>,
    /// Animation clips
    pub actions: Vec<Action>,
    /// Keyframe tracks indexed by action, then bone
    pub tracks: Vec<Vec<KeyframeTrack>>,
    /// Meshes drawn with this skeleton
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub meshes: Vec<MeshDesc>,
}

impl RiggedModel {
    /// Start building a model
    pub fn builder(name: impl Into<String>) -> RiggedModelBuilder {
        RiggedModelBuilder::new(name)
    }

    /// Get number of bones
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Get number of actions
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Get an action by index
    pub fn action(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    /// Get the track of `bone` in `action`
    pub fn track(&self, action: usize, bone: usize) -> Option<&KeyframeTrack> {
        self.tracks.get(action)?.get(bone)
    }

    /// Find a bone by name
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Report structural problems
    ///
    /// The model is still usable when problems are found: evaluation holds
    /// bones with malformed parents and missing samples at identity.
    pub fn validate(&self) -> Vec<RigError> {
        let mut problems = Vec::new();

        for (i, bone) in self.bones.iter().enumerate() {
            if bone.index != i {
                problems.push(RigError::MalformedRig {
                    bone: i,
                    reason: format!("stored index {} does not match position", bone.index),
                });
            }
            if let Some(parent) = bone.parent_index()
                && parent >= i
            {
                problems.push(RigError::MalformedRig {
                    bone: i,
                    reason: format!("parent {parent} is not stored before the bone"),
                });
            }
        }

        if self.tracks.len() != self.actions.len() {
            problems.push(RigError::MalformedRig {
                bone: 0,
                reason: format!(
                    "{} track sets for {} actions",
                    self.tracks.len(),
                    self.actions.len()
                ),
            });
        }

        for (a, action) in self.actions.iter().enumerate() {
            if action.is_static() {
                problems.push(RigError::DegenerateAction {
                    action: a,
                    frame_count: action.frame_count,
                });
            }
            let Some(tracks) = self.tracks.get(a) else {
                continue;
            };
            for (b, bone) in self.bones.iter().enumerate() {
                if bone.dummy {
                    continue;
                }
                let len = tracks.get(b).map_or(0, KeyframeTrack::len);
                if len < action.frame_count.max(1) {
                    problems.push(RigError::MalformedRig {
                        bone: b,
                        reason: format!(
                            "action {a}: track has {len} frames, expected {}",
                            action.frame_count
                        ),
                    });
                }
            }
        }

        problems
    }

    /// Decode a model from its JSON form
    #[cfg(feature = "serde-support")]
    pub fn from_json(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text).map_err(|e| RigError::Parse(e.to_string()))
    }

    /// Encode the model as pretty JSON
    #[cfg(feature = "serde-support")]
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| RigError::Parse(e.to_string()))
    }
}

/// Incremental construction of a [`RiggedModel`]
///
/// Bones get their index from insertion order. Tracks of bones added after
/// an action are padded with identity samples.
#[derive(Debug, Clone)]
pub struct RiggedModelBuilder {
    model: RiggedModel,
}

impl RiggedModelBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            model: RiggedModel {
                name: name.into(),
                ..RiggedModel::default()
            },
        }
    }

    /// Add a bone; `parent` is `None` for roots
    pub fn bone(mut self, name: impl Into<String>, parent: Option<usize>) -> Self {
        let index = self.model.bones.len();
        self.model.bones.push(match parent {
            Some(p) => Bone::child(index, p, name),
            None => Bone::root(index, name),
        });
        self
    }

    /// Add a placeholder bone
    pub fn dummy_bone(mut self, name: impl Into<String>, parent: Option<usize>) -> Self {
        self = self.bone(name, parent);
        if let Some(bone) = self.model.bones.last_mut() {
            bone.dummy = true;
        }
        self
    }

    /// Add an action with one track per bone (in bone order)
    pub fn action(mut self, action: Action, tracks: Vec<KeyframeTrack>) -> Self {
        self.model.actions.push(action);
        self.model.tracks.push(tracks);
        self
    }

    /// Add a mesh entry
    pub fn mesh(mut self, mesh: MeshDesc) -> Self {
        self.model.meshes.push(mesh);
        self
    }

    /// Finish the model
    pub fn build(mut self) -> RiggedModel {
        let bone_count = self.model.bones.len();
        for (action, tracks) in self.model.actions.iter().zip(self.model.tracks.iter_mut()) {
            while tracks.len() < bone_count {
                tracks.push(KeyframeTrack::constant(
                    Quat::IDENTITY,
                    Vec3::ZERO,
                    action.frame_count.max(1),
                ));
            }
        }
        self.model
    }
}
