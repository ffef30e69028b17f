//! Mesh GPU resources.
//!
//! A [`Mesh`] owns device-local vertex and index buffers, uploaded once
//! through the staging path, plus a model matrix that travels to the vertex
//! shader as a push constant.

use std::sync::Arc;

use glam::Mat4;
use tracing::debug;

use prism_rhi::buffer::{Buffer, BufferUsage};
use prism_rhi::command::CommandPool;
use prism_rhi::device::Device;
use prism_rhi::vertex::Vertex;
use prism_rhi::{RhiError, RhiResult};

/// A mesh with device-local geometry and a model transform.
pub struct Mesh {
    /// Device-local vertex buffer.
    vertex_buffer: Buffer,
    /// Device-local 32-bit index buffer.
    index_buffer: Buffer,
    /// Number of indices to draw.
    index_count: u32,
    /// Object-to-world transform, pushed per draw.
    model: Mat4,
}

impl Mesh {
    /// Uploads the given geometry to device-local buffers.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `command_pool` - Pool used for the staging copy commands
    /// * `vertices` - Vertex data
    /// * `indices` - 32-bit index data
    ///
    /// # Errors
    ///
    /// Returns an error if the geometry is empty or the upload fails.
    pub fn new(
        device: Arc<Device>,
        command_pool: &CommandPool,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> RhiResult<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(RhiError::InvalidHandle(
                "Mesh requires non-empty vertex and index data".to_string(),
            ));
        }

        let vertex_buffer = Buffer::device_local_with_data(
            device.clone(),
            command_pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice(vertices),
        )?;

        let index_buffer = Buffer::device_local_with_data(
            device,
            command_pool,
            BufferUsage::Index,
            bytemuck::cast_slice(indices),
        )?;

        debug!(
            "Created mesh: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            model: Mat4::IDENTITY,
        })
    }

    /// Returns the vertex buffer.
    #[inline]
    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    /// Returns the index buffer.
    #[inline]
    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    /// Returns the number of indices.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Returns the model matrix.
    #[inline]
    pub fn model(&self) -> Mat4 {
        self.model
    }

    /// Replaces the model matrix.
    pub fn set_model(&mut self, model: Mat4) {
        self.model = model;
    }

    /// Rotates the mesh around the Z axis by `angle` radians.
    pub fn spin(&mut self, angle: f32) {
        self.model *= Mat4::from_rotation_z(angle);
    }
}
