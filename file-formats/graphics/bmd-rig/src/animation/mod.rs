//! Action playback and bone hierarchy evaluation
//!
//! This module provides the per-tick animation pipeline for rigged models:
//! - Action player turning simulated time into a keyframe pair and blend factor
//! - Keyframe interpolation (slerp for rotations, lerp for translations)
//! - Bone hierarchy evaluation with change detection
//!
//! # Example
//!
//! ```rust
//! use bmd_rig::animation::{ActionPlayer, BoneHierarchyEvaluator, EvaluatorOptions};
//! use bmd_rig::model::{Action, KeyframeTrack, RiggedModel};
//! use glam::{Quat, Vec3};
//!
//! let model = RiggedModel::builder("box")
//!     .bone("root", None)
//!     .action(
//!         Action::new(2, 4.0),
//!         vec![KeyframeTrack::new(
//!             vec![Quat::IDENTITY; 2],
//!             vec![Vec3::ZERO, Vec3::Z],
//!         )],
//!     )
//!     .build();
//!
//! let mut player = ActionPlayer::new(0);
//! let mut evaluator = BoneHierarchyEvaluator::new(&model, EvaluatorOptions::default());
//!
//! player.advance(0.1);
//! let tick = player.sample(&model);
//! let changed = evaluator.evaluate(&model, &tick.frame, 0.0);
//! assert!(changed);
//! ```

mod hierarchy;
mod interpolation;
mod player;

pub use hierarchy::{BoneHierarchyEvaluator, EvaluatorOptions};
pub use interpolation::{LocalPose, lerp, sample_track, slerp};
pub use player::{ActionPlayer, FrameState, TickOutcome};
