//! Skeletal animation runtime for BMD rigged models
//!
//! Turns a shared, immutable [`RiggedModel`] into per-instance bone world
//! matrices each tick, packs them into fixed-size skinning buffers and links
//! instances together (mirrored equipment, socketed wings and weapons).
//!
//! ```rust
//! use std::sync::Arc;
//! use bmd_rig::{Action, InstanceArena, KeyframeTrack, ModelInstance, RiggedModel};
//! use glam::{Quat, Vec3};
//!
//! let model = Arc::new(
//!     RiggedModel::builder("lamp")
//!         .bone("root", None)
//!         .action(Action::new(3, 10.0), vec![KeyframeTrack::constant(Quat::IDENTITY, Vec3::Z, 3)])
//!         .build(),
//! );
//!
//! let mut arena = InstanceArena::new();
//! let lamp = arena.spawn(ModelInstance::from_model("lamp", model)?);
//! arena.update_all(1.0 / 60.0);
//! assert_eq!(arena.bone_matrices(lamp).map(<[_]>::len), Some(1));
//! # Ok::<(), bmd_rig::RigError>(())
//! ```

pub mod animation;
pub mod attachment;
pub mod cache;
pub mod composite;
pub mod converter;
pub mod error;
pub mod instance;
pub mod model;
pub mod registry;
pub mod scene;
pub mod skinning;

// Re-export common types
pub use animation::{ActionPlayer, BoneHierarchyEvaluator, EvaluatorOptions, FrameState};
pub use attachment::AttachmentLink;
pub use cache::{AssetSource, MemorySource, ModelCache};
#[cfg(feature = "serde-support")]
pub use cache::JsonFileSource;
pub use composite::Composite;
pub use converter::{InterchangeScene, export_scene};
pub use error::{Result, RigError};
pub use instance::{InstanceOptions, InstanceState, InstanceTick, ModelInstance, SceneNodeId};
pub use model::{Action, Bone, KeyframeTrack, MeshDesc, MeshFlags, RiggedModel};
pub use registry::SpawnRegistry;
pub use scene::{InstanceArena, InstanceHandle};
pub use skinning::{BONE_UNIFORM_NAME, MAX_BONES, SkinBinding, SkinBufferBuilder, SkinOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
