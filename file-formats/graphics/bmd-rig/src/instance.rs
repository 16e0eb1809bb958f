//! Animated instance of a rigged model
//!
//! A [`ModelInstance`] owns everything that changes per tick for one spawned
//! object: playback clock, bone world matrices, skin buffers and root
//! placement. The model itself is shared read-only.
//!
//! Lifecycle: `Uninitialized` until the first successful [`ModelInstance::load`],
//! then `Ready`. [`ModelInstance::dispose`] moves to the terminal `Disposed`
//! state; later ticks are ignored.

use std::sync::Arc;

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::animation::{ActionPlayer, BoneHierarchyEvaluator, EvaluatorOptions, FrameState};
use crate::attachment::SocketPlacement;
use crate::error::{Result, RigError};
use crate::model::{MeshFlags, RiggedModel};
use crate::skinning::{SkinBinding, SkinBufferBuilder, SkinOptions};

/// Lifecycle state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// No model assigned yet
    Uninitialized,
    /// Model loaded, evaluated at least once
    Ready,
    /// Storage released; terminal
    Disposed,
}

/// Opaque id of the host scene-graph node carrying this instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneNodeId(pub u64);

/// Root transform of an instance in the host scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Placement {
    /// Placement at the origin
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Build from a position, uniform scale and XYZ Euler angles in degrees
    pub fn from_angles(position: Vec3, scale: f32, angles_degrees: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::from_euler(
                EulerRot::XYZ,
                angles_degrees.x.to_radians(),
                angles_degrees.y.to_radians(),
                angles_degrees.z.to_radians(),
            ),
            scale: Vec3::splat(scale),
        }
    }

    /// Root matrix: translation * rotation * scale
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Configuration shared by all parts of an instance
#[derive(Debug, Clone, Default)]
pub struct InstanceOptions {
    pub evaluator: EvaluatorOptions,
    pub skin: SkinOptions,
}

/// Result of one instance update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstanceTick {
    /// The current action completed a loop (or a static pose was entered)
    pub iteration_finished: bool,
    /// The action switched since the previous tick
    pub action_changed: bool,
    /// Bone matrices changed and skin buffers were rebuilt
    pub dirty: bool,
}

/// One animated object
#[derive(Debug, Clone)]
pub struct ModelInstance {
    name: String,
    state: InstanceState,
    model: Option<Arc<RiggedModel>>,
    player: ActionPlayer,
    evaluator: BoneHierarchyEvaluator,
    /// Frame triple of the last evaluation
    frame: FrameState,
    skins: Vec<SkinBufferBuilder>,
    placement: Placement,
    scene_node: Option<SceneNodeId>,
    dirty: bool,
    /// Signals raised by the evaluation in `load`, reported by the next update
    carried: InstanceTick,
    root_height_offset: f32,
    /// Driven by a parent's matrices; no playback of its own
    mirrored: bool,
    options: InstanceOptions,
}

impl ModelInstance {
    /// Create an uninitialized instance
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, InstanceOptions::default())
    }

    /// Create an uninitialized instance with custom options
    pub fn with_options(name: impl Into<String>, options: InstanceOptions) -> Self {
        Self {
            name: name.into(),
            state: InstanceState::Uninitialized,
            model: None,
            player: ActionPlayer::new(0),
            evaluator: BoneHierarchyEvaluator::empty(),
            frame: FrameState::default(),
            skins: Vec::new(),
            placement: Placement::IDENTITY,
            scene_node: None,
            dirty: false,
            carried: InstanceTick::default(),
            root_height_offset: 0.0,
            mirrored: false,
            options,
        }
    }

    /// Create an instance and load `model` immediately
    pub fn from_model(name: impl Into<String>, model: Arc<RiggedModel>) -> Result<Self> {
        let mut instance = Self::new(name);
        instance.load(model)?;
        Ok(instance)
    }

    /// Assign a model, allocate bone and skin storage and evaluate once
    ///
    /// Playback keeps its current action and clock. The action change and,
    /// for a static action, its completion are reported by the next
    /// [`ModelInstance::update`].
    pub fn load(&mut self, model: Arc<RiggedModel>) -> Result<()> {
        if self.state == InstanceState::Disposed {
            return Err(RigError::NotReady(format!("{} is disposed", self.name)));
        }

        for problem in model.validate() {
            log::debug!("{}: {}", model.name, problem);
        }

        self.evaluator = BoneHierarchyEvaluator::new(&model, self.options.evaluator.clone());

        let mesh_flags: Vec<MeshFlags> = if model.meshes.is_empty() {
            vec![MeshFlags::empty()]
        } else {
            model.meshes.iter().map(|m| m.flags).collect()
        };
        self.skins = mesh_flags
            .into_iter()
            .enumerate()
            .map(|(i, flags)| SkinBufferBuilder::new(i, flags, self.options.skin.clone()))
            .collect();

        self.player.restart();
        self.model = Some(model);
        self.state = InstanceState::Ready;
        let tick = self.evaluate_now();
        self.carried = InstanceTick {
            dirty: false,
            ..tick
        };
        Ok(())
    }

    /// Advance playback by `delta_seconds` and re-evaluate the skeleton
    ///
    /// Skin buffers are rebuilt only when some bone moved beyond the
    /// epsilon. Mirrored instances are refreshed by their parent instead.
    pub fn update(&mut self, delta_seconds: f64) -> InstanceTick {
        if self.state != InstanceState::Ready || self.mirrored {
            return InstanceTick::default();
        }
        self.player.advance(delta_seconds);
        let carried = std::mem::take(&mut self.carried);
        let tick = self.evaluate_now();
        InstanceTick {
            iteration_finished: tick.iteration_finished || carried.iteration_finished,
            action_changed: tick.action_changed || carried.action_changed,
            dirty: tick.dirty,
        }
    }

    fn evaluate_now(&mut self) -> InstanceTick {
        let Some(model) = self.model.as_ref() else {
            return InstanceTick::default();
        };

        let tick = self.player.sample(model);
        self.frame = tick.frame;
        let changed = self
            .evaluator
            .evaluate(model, &tick.frame, self.root_height_offset);

        self.dirty = changed || tick.action_changed;
        if self.dirty {
            let matrices = self.evaluator.world_matrices();
            for skin in &mut self.skins {
                skin.rebuild(matrices);
            }
        }

        InstanceTick {
            iteration_finished: tick.iteration_finished,
            action_changed: tick.action_changed,
            dirty: self.dirty,
        }
    }

    /// Take the parent's matrices as this instance's pose
    pub(crate) fn refresh_mirrored(&mut self, matrices: &[Mat4], dirty: bool) -> InstanceTick {
        if self.state != InstanceState::Ready {
            return InstanceTick::default();
        }
        self.dirty = dirty;
        for skin in &mut self.skins {
            skin.rebuild_if_dirty(dirty, matrices);
        }
        InstanceTick {
            dirty,
            ..InstanceTick::default()
        }
    }

    pub(crate) fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    /// Check if this instance takes its pose from a parent
    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// Switch the playing action; returns false if it was already playing
    pub fn set_action(&mut self, action: usize) -> bool {
        self.player.set_action(action)
    }

    /// Set the external animation speed multiplier
    pub fn set_animation_speed(&mut self, speed: f32) {
        self.player.set_animation_speed(speed);
    }

    /// Set the height added to the root bone of root-locked actions
    pub fn set_root_height_offset(&mut self, offset: f32) {
        self.root_height_offset = offset;
    }

    /// Place the instance in the host scene
    pub fn update_location(&mut self, position: Vec3, scale: f32, angles_degrees: Vec3) {
        self.placement = Placement::from_angles(position, scale, angles_degrees);
    }

    /// Move the root to a socket placement, keeping the current scale
    pub fn apply_socket(&mut self, socket: SocketPlacement) {
        self.placement.position = socket.translation;
        self.placement.rotation = socket.rotation;
    }

    /// Bind the instance to a host scene node
    pub fn attach_root(&mut self, node: SceneNodeId) {
        self.scene_node = Some(node);
    }

    /// Release matrices and skin buffers; the instance ignores later ticks
    pub fn dispose(&mut self) {
        if self.state == InstanceState::Disposed {
            return;
        }
        log::debug!("Disposing instance {}", self.name);
        self.evaluator.release();
        for skin in &mut self.skins {
            skin.release();
        }
        self.skins.clear();
        self.model = None;
        self.scene_node = None;
        self.mirrored = false;
        self.dirty = false;
        self.carried = InstanceTick::default();
        self.state = InstanceState::Disposed;
    }

    /// Get the instance name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the lifecycle state
    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Check if the instance is loaded and not disposed
    pub fn is_ready(&self) -> bool {
        self.state == InstanceState::Ready
    }

    /// Get the shared model
    pub fn model(&self) -> Option<&Arc<RiggedModel>> {
        self.model.as_ref()
    }

    /// Check if the last tick changed any bone matrix
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Get this instance's own bone world matrices
    ///
    /// Mirrored instances do not evaluate; read their pose through the
    /// arena instead.
    pub fn bone_matrices(&self) -> &[Mat4] {
        self.evaluator.world_matrices()
    }

    /// Get the evaluator (local poses, resolved parents)
    pub fn evaluator(&self) -> &BoneHierarchyEvaluator {
        &self.evaluator
    }

    /// Get the frame triple used by the last evaluation
    pub fn frame(&self) -> FrameState {
        self.frame
    }

    /// Get the playback state
    pub fn player(&self) -> &ActionPlayer {
        &self.player
    }

    /// Get the current action index
    pub fn current_action(&self) -> usize {
        self.player.current_action()
    }

    /// Get the action that played before the last switch
    pub fn prior_action(&self) -> Option<usize> {
        self.player.prior_action()
    }

    /// Get the root placement
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Get the root matrix in the host scene
    pub fn root_matrix(&self) -> Mat4 {
        self.placement.matrix()
    }

    /// Get the bound scene node
    pub fn scene_node(&self) -> Option<SceneNodeId> {
        self.scene_node
    }

    /// Get the skin buffer of one mesh
    pub fn skin(&self, mesh_index: usize) -> Option<&SkinBufferBuilder> {
        self.skins.get(mesh_index)
    }

    /// Bindings for every mesh, in mesh order
    pub fn skin_bindings(&self) -> Vec<SkinBinding<'_>> {
        self.skins.iter().map(SkinBufferBuilder::binding).collect()
    }
}
