//! Export of rigged models to a node/skin/channel interchange scene
//!
//! The exported scene mirrors what the realtime evaluator computes: node
//! rest poses are the locals at action 0, frame 0; every action becomes an
//! animation with one translation and one rotation channel per animated
//! bone, keyed at `k / playback_speed` seconds. Sampling an
//! [`crate::ModelInstance`] at those times reproduces the channel values.

use glam::{Mat4, Quat, Vec3};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::animation::{BoneHierarchyEvaluator, EvaluatorOptions, FrameState};
use crate::model::{Action, RiggedModel};

/// A skeleton node with its rest pose
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub translation: Vec3,
    pub rotation: Quat,
}

/// Joint list with inverse bind matrices, in node order
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct Skin {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// Keyframe values of one channel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-support", serde(tag = "path", content = "values"))]
pub enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
}

impl ChannelValues {
    /// Get number of keys
    pub fn len(&self) -> usize {
        match self {
            Self::Translation(v) => v.len(),
            Self::Rotation(v) => v.len(),
        }
    }

    /// Check if the channel has no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keyed property of one node
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct Channel {
    pub node: usize,
    /// Key times in seconds
    pub times: Vec<f32>,
    pub values: ChannelValues,
}

/// One exported action
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct Animation {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl Animation {
    /// Find the translation keys of a node
    pub fn translations(&self, node: usize) -> Option<(&[f32], &[Vec3])> {
        self.channels.iter().find_map(|c| match &c.values {
            ChannelValues::Translation(v) if c.node == node => Some((c.times.as_slice(), v.as_slice())),
            _ => None,
        })
    }

    /// Find the rotation keys of a node
    pub fn rotations(&self, node: usize) -> Option<(&[f32], &[Quat])> {
        self.channels.iter().find_map(|c| match &c.values {
            ChannelValues::Rotation(v) if c.node == node => Some((c.times.as_slice(), v.as_slice())),
            _ => None,
        })
    }
}

/// Exported scene
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct InterchangeScene {
    pub name: String,
    pub nodes: Vec<SceneNode>,
    pub skin: Skin,
    pub animations: Vec<Animation>,
}

impl InterchangeScene {
    /// Encode the scene as pretty JSON
    #[cfg(feature = "serde-support")]
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::RigError::Parse(e.to_string()))
    }
}

/// Export `model` as an interchange scene
pub fn export_scene(model: &RiggedModel) -> InterchangeScene {
    let mut evaluator = BoneHierarchyEvaluator::new(model, EvaluatorOptions::default());
    if !model.actions.is_empty() {
        evaluator.evaluate(model, &FrameState::start_of(0), 0.0);
    }

    let mut nodes: Vec<SceneNode> = model
        .bones
        .iter()
        .enumerate()
        .map(|(i, bone)| {
            let rest = evaluator.local_pose(i).unwrap_or_default();
            SceneNode {
                name: bone.name.clone(),
                parent: evaluator.parent(i),
                children: Vec::new(),
                translation: rest.translation,
                rotation: rest.rotation,
            }
        })
        .collect();

    for i in 0..nodes.len() {
        if let Some(parent) = nodes[i].parent {
            nodes[parent].children.push(i);
        }
    }

    let skin = Skin {
        joints: (0..nodes.len()).collect(),
        inverse_bind_matrices: evaluator
            .world_matrices()
            .iter()
            .map(|world| {
                let inverse = world.inverse();
                if inverse.is_finite() { inverse } else { Mat4::IDENTITY }
            })
            .collect(),
    };

    let animations = model
        .actions
        .iter()
        .enumerate()
        .map(|(a, action)| export_action(model, &evaluator, a, action))
        .collect();

    InterchangeScene {
        name: model.name.clone(),
        nodes,
        skin,
        animations,
    }
}

fn export_action(
    model: &RiggedModel,
    evaluator: &BoneHierarchyEvaluator,
    index: usize,
    action: &Action,
) -> Animation {
    let name = if action.name.is_empty() {
        format!("action_{index}")
    } else {
        action.name.clone()
    };

    let frames = action.frame_count.max(1);
    let speed = action.playback_speed;
    let times: Vec<f32> = if speed.is_finite() && speed > 0.0 {
        (0..frames).map(|k| k as f32 / speed).collect()
    } else {
        log::warn!("{name}: playback speed {speed} is not positive, keying in frame units");
        (0..frames).map(|k| k as f32).collect()
    };

    let mut channels = Vec::new();
    for b in 0..model.bone_count() {
        if evaluator.is_skipped(b) {
            continue;
        }
        let track = model.track(index, b);
        let mut rotations = Vec::with_capacity(frames);
        let mut translations = Vec::with_capacity(frames);

        for k in 0..frames {
            let (rotation, mut translation) = track
                .and_then(|t| t.sample(k))
                .filter(|(r, t)| r.is_finite() && t.is_finite())
                .unwrap_or((Quat::IDENTITY, Vec3::ZERO));

            if b == 0
                && action.lock_root_xy
                && let Some((_, first)) = track.and_then(|t| t.sample(0))
            {
                translation.x = first.x;
                translation.y = first.y;
            }

            rotations.push(rotation);
            translations.push(translation);
        }

        channels.push(Channel {
            node: b,
            times: times.clone(),
            values: ChannelValues::Translation(translations),
        });
        channels.push(Channel {
            node: b,
            times: times.clone(),
            values: ChannelValues::Rotation(rotations),
        });
    }

    Animation { name, channels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyframeTrack;
    use pretty_assertions::assert_eq;

    fn arm() -> RiggedModel {
        RiggedModel::builder("arm")
            .bone("shoulder", None)
            .bone("elbow", Some(0))
            .dummy_bone("marker", Some(1))
            .action(
                Action::new(3, 2.0).named("wave").with_root_lock(true),
                vec![
                    KeyframeTrack::new(
                        vec![Quat::IDENTITY; 3],
                        vec![Vec3::new(0.0, 0.0, 1.0), Vec3::new(4.0, 5.0, 2.0), Vec3::new(1.0, 1.0, 3.0)],
                    ),
                    KeyframeTrack::constant(Quat::from_rotation_z(0.5), Vec3::Y, 3),
                ],
            )
            .build()
    }

    #[test]
    fn test_nodes_follow_hierarchy() {
        let scene = export_scene(&arm());
        assert_eq!(scene.nodes.len(), 3);
        assert_eq!(scene.nodes[0].parent, None);
        assert_eq!(scene.nodes[0].children, vec![1]);
        assert_eq!(scene.nodes[1].parent, Some(0));
        assert_eq!(scene.nodes[1].translation, Vec3::Y);
        assert_eq!(scene.skin.joints, vec![0, 1, 2]);
    }

    #[test]
    fn test_inverse_bind_undoes_rest_pose() {
        let scene = export_scene(&arm());
        let rest_world = Mat4::from_translation(Vec3::Z)
            * Mat4::from_rotation_translation(Quat::from_rotation_z(0.5), Vec3::Y);
        let product = scene.skin.inverse_bind_matrices[1] * rest_world;
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_channel_times_and_root_lock() {
        let scene = export_scene(&arm());
        let wave = &scene.animations[0];
        assert_eq!(wave.name, "wave");
        // Two animated bones, dummy skipped
        assert_eq!(wave.channels.len(), 4);

        let (times, values) = wave.translations(0).unwrap();
        assert_eq!(times, &[0.0, 0.5, 1.0]);
        assert_eq!(values[1], Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(values[2], Vec3::new(0.0, 0.0, 3.0));
        assert!(wave.rotations(2).is_none());
    }

    #[test]
    fn test_non_positive_speed_keys_frames() {
        let model = RiggedModel::builder("frozen")
            .bone("root", None)
            .action(Action::new(2, 0.0), vec![KeyframeTrack::constant(Quat::IDENTITY, Vec3::ZERO, 2)])
            .build();
        let scene = export_scene(&model);
        let (times, _) = scene.animations[0].rotations(0).unwrap();
        assert_eq!(times, &[0.0, 1.0]);
        assert_eq!(scene.animations[0].name, "action_0");
    }

    #[test]
    fn test_model_without_actions() {
        let model = RiggedModel::builder("prop").bone("root", None).build();
        let scene = export_scene(&model);
        assert!(scene.animations.is_empty());
        assert_eq!(scene.nodes[0].rotation, Quat::IDENTITY);
        assert_eq!(scene.skin.inverse_bind_matrices, vec![Mat4::IDENTITY]);
    }
}
