//! The vertex format shared by meshes and the graphics pipeline.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Position-and-color vertex, 24 bytes.
///
/// `#[repr(C)]` keeps the layout fixed: position at offset 0, color at
/// offset 12. Shader locations 0 and 1 respectively, both vec3.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Size of one vertex in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Binding 0, per-vertex input rate.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute layout matching the vertex shader inputs.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, color) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(Vertex::size(), 24);
        assert_eq!(std::mem::offset_of!(Vertex, position), 0);
        assert_eq!(std::mem::offset_of!(Vertex, color), 12);
    }

    #[test]
    fn test_binding_description() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 24);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_attributes_match_layout() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs.len(), 2);

        for (i, attr) in attrs.iter().enumerate() {
            assert_eq!(attr.binding, 0);
            assert_eq!(attr.location, i as u32);
            assert_eq!(attr.format, vk::Format::R32G32B32_SFLOAT);
        }
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
    }

    #[test]
    fn test_vertex_bytes() {
        let vertex = Vertex::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.5, 0.6, 0.7));
        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 24);

        let back: &Vertex = bytemuck::from_bytes(bytes);
        assert_eq!(back.position, vertex.position);
        assert_eq!(back.color, vertex.color);
    }
}
