//! Uniform buffer object definitions for shaders.
//!
//! These structures must match the GLSL uniform block layouts exactly.
//! All structures use `#[repr(C)]` for predictable memory layout and implement
//! `Pod` and `Zeroable` for safe byte casting.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// View-projection uniform buffer data.
///
/// This structure matches the GLSL `UboViewProjection` block (binding 0).
/// The per-mesh model matrix travels as a push constant, not here.
///
/// # Memory Layout
///
/// - Offset 0: projection matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Total size: 128 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ViewProjection {
    /// Projection matrix (view to clip space), Y already flipped for Vulkan.
    pub projection: Mat4,
    /// View matrix (world to view space).
    pub view: Mat4,
}

impl ViewProjection {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates a view-projection UBO from the two matrices.
    pub fn new(projection: Mat4, view: Mat4) -> Self {
        Self { projection, view }
    }
}

/// Size in bytes of the vertex-stage push constant (one model matrix).
pub const PUSH_CONSTANT_SIZE: usize = std::mem::size_of::<Mat4>();

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::mem::offset_of;

    #[test]
    fn test_view_projection_size() {
        // 2 Mat4 (2 * 64) = 128 bytes
        assert_eq!(ViewProjection::SIZE, 128);
    }

    #[test]
    fn test_view_projection_offsets() {
        assert_eq!(offset_of!(ViewProjection, projection), 0);
        assert_eq!(offset_of!(ViewProjection, view), 64);
    }

    #[test]
    fn test_view_projection_alignment() {
        // Mat4 requires 16-byte alignment for GPU visibility
        assert_eq!(std::mem::align_of::<ViewProjection>(), 16);
    }

    #[test]
    fn test_push_constant_size() {
        assert_eq!(PUSH_CONSTANT_SIZE, 64);
    }

    #[test]
    fn test_view_projection_bytes() {
        let proj = Mat4::perspective_rh(45.0_f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let ubo = ViewProjection::new(proj, view);

        let bytes: &[u8] = bytemuck::bytes_of(&ubo);
        assert_eq!(bytes.len(), ViewProjection::SIZE);

        let back: &ViewProjection = bytemuck::from_bytes(bytes);
        assert_eq!(back.projection, proj);
        assert_eq!(back.view, view);
    }
}
