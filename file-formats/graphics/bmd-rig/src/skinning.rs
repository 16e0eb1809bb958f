//! Rigid skinning buffers for rigged models
//!
//! Each mesh of an instance owns a fixed-capacity array of bone matrices
//! that the vertex shader reads through a uniform array. Vertices are bound
//! to exactly one bone, so skinning is a single matrix multiply per vertex:
//! there are no weights to normalize and no blending between bones.
//!
//! # Example
//!
//! ```rust
//! use bmd_rig::skinning::{MAX_BONES, RigidVertex, SkinBufferBuilder, SkinOptions};
//! use bmd_rig::model::MeshFlags;
//! use glam::{Mat4, Vec3};
//!
//! let mut skin = SkinBufferBuilder::new(0, MeshFlags::empty(), SkinOptions::default());
//! skin.rebuild(&[Mat4::from_translation(Vec3::X)]);
//!
//! assert_eq!(skin.buffer().len(), MAX_BONES * 16);
//!
//! let moved = skin.skin_vertices(&[RigidVertex::new(Vec3::ZERO, 0)]);
//! assert_eq!(moved[0], Vec3::X);
//! ```

use glam::{Mat4, Vec3};

use crate::model::MeshFlags;

/// Capacity of the shader's bone matrix array
pub const MAX_BONES: usize = 64;

/// Floats per bone matrix in the flat buffer
pub const FLOATS_PER_BONE: usize = 16;

/// Name of the shader uniform the buffer is bound to
pub const BONE_UNIFORM_NAME: &str = "uBoneMatrices";

/// Options for controlling skin buffer layout
#[derive(Debug, Clone)]
pub struct SkinOptions {
    /// Number of matrix slots in the buffer; clamped to [`MAX_BONES`]
    pub max_bones: usize,
}

impl Default for SkinOptions {
    fn default() -> Self {
        Self {
            max_bones: MAX_BONES,
        }
    }
}

impl SkinOptions {
    fn slots(&self) -> usize {
        self.max_bones.clamp(1, MAX_BONES)
    }
}

/// Vertex bound to a single bone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidVertex {
    /// Position relative to the bone
    pub position: Vec3,
    /// Index of the bone carrying this vertex
    pub bone: u16,
}

impl RigidVertex {
    /// Create a vertex
    pub const fn new(position: Vec3, bone: u16) -> Self {
        Self { position, bone }
    }

    /// Bone index attribute as uploaded: primary bone, reserved slot (always 0)
    pub fn bone_attribute(&self) -> [f32; 2] {
        [self.bone as f32, 0.0]
    }
}

/// Everything the renderer needs to draw one mesh with its bone matrices
#[derive(Debug, Clone, Copy)]
pub struct SkinBinding<'a> {
    /// Mesh index within the model
    pub mesh_index: usize,
    /// Opaque mesh flags from the loader
    pub flags: MeshFlags,
    /// Uniform array the matrices are bound to
    pub uniform: &'static str,
    /// Flat column-major matrices, `slots * 16` floats
    pub matrices: &'a [f32],
    /// Changes whenever the matrices were rebuilt
    pub revision: u64,
}

impl SkinBinding<'_> {
    /// Check if the mesh should be drawn
    pub fn is_visible(&self) -> bool {
        !self.flags.contains(MeshFlags::HIDDEN)
    }
}

/// Fixed-capacity bone matrix buffer for one mesh
#[derive(Debug, Clone)]
pub struct SkinBufferBuilder {
    mesh_index: usize,
    flags: MeshFlags,
    /// Flat matrices, `slots * 16` floats
    buffer: Vec<f32>,
    slots: usize,
    revision: u64,
    truncation_reported: bool,
}

impl SkinBufferBuilder {
    /// Create a buffer filled with identity matrices
    pub fn new(mesh_index: usize, flags: MeshFlags, options: SkinOptions) -> Self {
        let slots = options.slots();
        let mut buffer = Vec::with_capacity(slots * FLOATS_PER_BONE);
        for _ in 0..slots {
            buffer.extend_from_slice(&Mat4::IDENTITY.to_cols_array());
        }

        Self {
            mesh_index,
            flags,
            buffer,
            slots,
            revision: 0,
            truncation_reported: false,
        }
    }

    /// Copy `matrices` into the buffer; unused slots become identity
    pub fn rebuild(&mut self, matrices: &[Mat4]) {
        if self.buffer.is_empty() {
            return;
        }

        if matrices.len() > self.slots && !self.truncation_reported {
            log::warn!(
                "Mesh {}: {} bones exceed the {} matrix slots, extra bones are dropped",
                self.mesh_index,
                matrices.len(),
                self.slots
            );
            self.truncation_reported = true;
        }

        for (slot, chunk) in self.buffer.chunks_exact_mut(FLOATS_PER_BONE).enumerate() {
            let matrix = matrices.get(slot).copied().unwrap_or(Mat4::IDENTITY);
            matrix.write_cols_to_slice(chunk);
        }

        self.revision += 1;
    }

    /// Rebuild only when `dirty`; returns whether a rebuild happened
    pub fn rebuild_if_dirty(&mut self, dirty: bool, matrices: &[Mat4]) -> bool {
        if dirty {
            self.rebuild(matrices);
        }
        dirty
    }

    /// Get the flat matrix buffer
    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    /// Get the rebuild counter
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Get the number of matrix slots
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Get the mesh flags
    pub fn flags(&self) -> MeshFlags {
        self.flags
    }

    /// Get the matrix stored in `slot`
    pub fn matrix(&self, slot: usize) -> Mat4 {
        self.buffer
            .get(slot * FLOATS_PER_BONE..(slot + 1) * FLOATS_PER_BONE)
            .map_or(Mat4::IDENTITY, Mat4::from_cols_slice)
    }

    /// Binding passed to the renderer at draw time
    pub fn binding(&self) -> SkinBinding<'_> {
        SkinBinding {
            mesh_index: self.mesh_index,
            flags: self.flags,
            uniform: BONE_UNIFORM_NAME,
            matrices: &self.buffer,
            revision: self.revision,
        }
    }

    /// Transform vertices the way the vertex shader does
    ///
    /// Bone indices outside the buffer use identity, matching the identity
    /// fill of unused slots.
    pub fn skin_vertices(&self, vertices: &[RigidVertex]) -> Vec<Vec3> {
        vertices
            .iter()
            .map(|v| self.matrix(v.bone as usize).transform_point3(v.position))
            .collect()
    }

    /// Free the buffer; the builder draws nothing afterwards
    pub fn release(&mut self) {
        self.buffer = Vec::new();
        self.slots = 0;
    }

    /// Check if the buffer was released
    pub fn is_released(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_buffer_is_identity() {
        let skin = SkinBufferBuilder::new(0, MeshFlags::empty(), SkinOptions::default());
        assert_eq!(skin.buffer().len(), MAX_BONES * FLOATS_PER_BONE);
        assert_eq!(skin.matrix(0), Mat4::IDENTITY);
        assert_eq!(skin.matrix(MAX_BONES - 1), Mat4::IDENTITY);
        assert_eq!(skin.revision(), 0);
    }

    #[test]
    fn test_rebuild_fills_tail_with_identity() {
        let mut skin = SkinBufferBuilder::new(0, MeshFlags::empty(), SkinOptions::default());
        let moved = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));

        skin.rebuild(&[moved, moved, moved]);
        skin.rebuild(&[moved]);

        assert_eq!(skin.matrix(0), moved);
        assert_eq!(skin.matrix(1), Mat4::IDENTITY);
        assert_eq!(skin.revision(), 2);
        // Column-major: translation lives in floats 12..15
        assert_eq!(&skin.buffer()[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rebuild_if_dirty() {
        let mut skin = SkinBufferBuilder::new(0, MeshFlags::empty(), SkinOptions::default());
        assert!(!skin.rebuild_if_dirty(false, &[Mat4::from_translation(Vec3::X)]));
        assert_eq!(skin.revision(), 0);
        assert_eq!(skin.matrix(0), Mat4::IDENTITY);

        assert!(skin.rebuild_if_dirty(true, &[Mat4::from_translation(Vec3::X)]));
        assert_eq!(skin.revision(), 1);
    }

    #[test]
    fn test_truncates_large_skeletons() {
        let options = SkinOptions { max_bones: 2 };
        let mut skin = SkinBufferBuilder::new(0, MeshFlags::empty(), options);
        let matrices = vec![Mat4::from_translation(Vec3::Y); 5];
        skin.rebuild(&matrices);

        assert_eq!(skin.slots(), 2);
        assert_eq!(skin.buffer().len(), 2 * FLOATS_PER_BONE);
        assert_eq!(skin.matrix(1), Mat4::from_translation(Vec3::Y));
        assert_eq!(skin.matrix(2), Mat4::IDENTITY);
    }

    #[test]
    fn test_slots_clamped_to_capacity() {
        let skin = SkinBufferBuilder::new(0, MeshFlags::empty(), SkinOptions { max_bones: 500 });
        assert_eq!(skin.slots(), MAX_BONES);
    }

    #[test]
    fn test_rigid_skinning() {
        let mut skin = SkinBufferBuilder::new(0, MeshFlags::empty(), SkinOptions::default());
        skin.rebuild(&[
            Mat4::IDENTITY,
            Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0)),
        ]);

        let vertices = [
            RigidVertex::new(Vec3::X, 0),
            RigidVertex::new(Vec3::X, 1),
            RigidVertex::new(Vec3::X, 200),
        ];
        let out = skin.skin_vertices(&vertices);
        assert_eq!(out, vec![Vec3::X, Vec3::new(1.0, 0.0, 2.0), Vec3::X]);
    }

    #[test]
    fn test_bone_attribute_reserved_slot() {
        assert_eq!(RigidVertex::new(Vec3::ZERO, 7).bone_attribute(), [7.0, 0.0]);
    }

    #[test]
    fn test_binding_visibility() {
        let skin = SkinBufferBuilder::new(3, MeshFlags::HIDDEN, SkinOptions::default());
        let binding = skin.binding();
        assert_eq!(binding.mesh_index, 3);
        assert_eq!(binding.uniform, BONE_UNIFORM_NAME);
        assert!(!binding.is_visible());
    }

    #[test]
    fn test_release() {
        let mut skin = SkinBufferBuilder::new(0, MeshFlags::empty(), SkinOptions::default());
        skin.release();
        assert!(skin.is_released());
        skin.rebuild(&[Mat4::IDENTITY]);
        assert_eq!(skin.revision(), 0);
    }
}
