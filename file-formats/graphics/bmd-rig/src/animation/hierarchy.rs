//! Bone hierarchy evaluation for rigged models
//!
//! This module computes per-bone world matrices from a frame triple,
//! walking bones parent-before-child and tracking whether any matrix moved
//! since the previous evaluation.
//!
//! Matrices follow glam's convention (column-major storage, column vectors),
//! so a child's world matrix is `parent_world * local`. A bone at local
//! offset `(1, 0, 0)` under a root rotated 90° about Z lands at `(0, 1, 0)`.

use glam::Mat4;

use super::interpolation::{LocalPose, sample_track};
use super::player::FrameState;
use crate::error::RigError;
use crate::model::RiggedModel;

/// Options for controlling evaluation
#[derive(Debug, Clone)]
pub struct EvaluatorOptions {
    /// Largest per-element change that still counts as "unchanged"
    pub epsilon: f32,
    /// Report each recovered fault once per bone and action instead of
    /// every tick
    pub warn_once: bool,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            warn_once: true,
        }
    }
}

/// Per-instance bone world matrices with change detection
#[derive(Debug, Clone)]
pub struct BoneHierarchyEvaluator {
    /// Resolved parent per bone; malformed parents become `None`
    parents: Vec<Option<usize>>,
    /// Placeholder bones stay identity
    dummies: Vec<bool>,
    /// Bones with a malformed parent link stay identity
    malformed: Vec<bool>,
    /// World matrix per bone from the last evaluation
    world: Vec<Mat4>,
    /// Interpolated local pose per bone from the last evaluation
    local: Vec<LocalPose>,
    /// Bones already reported for the current action
    reported: Vec<bool>,
    reported_action: Option<usize>,
    /// Whether at least one evaluation ran since the last reset
    evaluated: bool,
    options: EvaluatorOptions,
}

impl BoneHierarchyEvaluator {
    /// Create an evaluator for `model`, validating its parent links once
    pub fn new(model: &RiggedModel, options: EvaluatorOptions) -> Self {
        let count = model.bone_count();
        let mut parents = Vec::with_capacity(count);
        let mut dummies = Vec::with_capacity(count);
        let mut malformed = Vec::with_capacity(count);

        for (i, bone) in model.bones.iter().enumerate() {
            let (parent, bad) = match bone.parent_index() {
                Some(p) if p < i => (Some(p), false),
                Some(p) => {
                    log::warn!(
                        "{}",
                        RigError::MalformedRig {
                            bone: i,
                            reason: format!(
                                "parent {p} is not stored before the bone, skipped as identity"
                            ),
                        }
                    );
                    (None, true)
                }
                None => (None, false),
            };
            parents.push(parent);
            dummies.push(bone.dummy);
            malformed.push(bad);
        }

        Self {
            parents,
            dummies,
            malformed,
            world: vec![Mat4::IDENTITY; count],
            local: vec![LocalPose::IDENTITY; count],
            reported: vec![false; count],
            reported_action: None,
            evaluated: false,
            options,
        }
    }

    /// Create an evaluator with no bones
    pub fn empty() -> Self {
        Self {
            parents: Vec::new(),
            dummies: Vec::new(),
            malformed: Vec::new(),
            world: Vec::new(),
            local: Vec::new(),
            reported: Vec::new(),
            reported_action: None,
            evaluated: false,
            options: EvaluatorOptions::default(),
        }
    }

    /// Get number of bones
    pub fn bone_count(&self) -> usize {
        self.world.len()
    }

    /// Evaluate every bone at `frame`
    ///
    /// `root_height_offset` is added to bone 0's height when the action
    /// locks the root. Returns true when any matrix changed by more than
    /// the epsilon, or on the first evaluation.
    pub fn evaluate(
        &mut self,
        model: &RiggedModel,
        frame: &FrameState,
        root_height_offset: f32,
    ) -> bool {
        let count = self.world.len().min(model.bone_count());

        if self.reported_action != Some(frame.action) {
            self.reported.iter_mut().for_each(|r| *r = false);
            self.reported_action = Some(frame.action);
        }

        let lock_root = model
            .action(frame.action)
            .is_some_and(|action| action.lock_root_xy);

        let mut changed = !self.evaluated;

        for i in 0..count {
            let world = if self.is_skipped(i) {
                self.local[i] = LocalPose::IDENTITY;
                Mat4::IDENTITY
            } else {
                let track = model.track(frame.action, i);
                let mut pose = match track.and_then(|t| sample_track(t, frame)) {
                    Some(pose) => pose,
                    None => {
                        self.report(i, || RigError::MalformedRig {
                            bone: i,
                            reason: format!(
                                "action {}: no samples for frames {}/{}",
                                frame.action, frame.frame_index, frame.next_frame
                            ),
                        });
                        LocalPose::IDENTITY
                    }
                };

                if i == 0 && lock_root {
                    if let Some((_, first)) = track.and_then(|t| t.sample(0)) {
                        pose.translation.x = first.x;
                        pose.translation.y = first.y;
                    }
                    pose.translation.z += root_height_offset;
                }

                self.local[i] = pose;
                let local = pose.to_matrix();

                let world = match self.parents[i] {
                    Some(parent) => self.world[parent] * local,
                    None => local,
                };

                if world.is_finite() {
                    world
                } else {
                    self.report(i, || RigError::NumericNonFinite {
                        bone: i,
                        action: frame.action,
                    });
                    self.local[i] = LocalPose::IDENTITY;
                    Mat4::IDENTITY
                }
            };

            if !changed && differs(&world, &self.world[i], self.options.epsilon) {
                changed = true;
            }
            self.world[i] = world;
        }

        self.evaluated = true;
        changed
    }

    fn report(&mut self, bone: usize, fault: impl FnOnce() -> RigError) {
        if self.options.warn_once && self.reported[bone] {
            return;
        }
        self.reported[bone] = true;
        log::warn!("{}", fault());
    }

    /// Get all world matrices
    pub fn world_matrices(&self) -> &[Mat4] {
        &self.world
    }

    /// Get world matrix for a specific bone
    pub fn world(&self, bone_index: usize) -> Mat4 {
        self.world.get(bone_index).copied().unwrap_or(Mat4::IDENTITY)
    }

    /// Get the interpolated local pose of a bone from the last evaluation
    pub fn local_pose(&self, bone_index: usize) -> Option<LocalPose> {
        self.local.get(bone_index).copied()
    }

    /// Check if a bone is held at identity (placeholder or malformed link)
    pub fn is_skipped(&self, bone_index: usize) -> bool {
        self.dummies.get(bone_index).copied().unwrap_or(false)
            || self.malformed.get(bone_index).copied().unwrap_or(false)
    }

    /// Get the resolved parent of a bone
    pub fn parent(&self, bone_index: usize) -> Option<usize> {
        self.parents.get(bone_index).copied().flatten()
    }

    /// Forget previous matrices so the next evaluation reports a change
    pub fn reset(&mut self) {
        self.world.iter_mut().for_each(|m| *m = Mat4::IDENTITY);
        self.local.iter_mut().for_each(|p| *p = LocalPose::IDENTITY);
        self.evaluated = false;
    }

    /// Free all per-bone storage
    pub fn release(&mut self) {
        *self = Self::empty();
    }
}

/// Check if any element differs by more than `epsilon`
fn differs(a: &Mat4, b: &Mat4, epsilon: f32) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .any(|(x, y)| (x - y).abs() > epsilon)
}
