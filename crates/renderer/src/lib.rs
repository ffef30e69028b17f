//! Vulkan renderer built on the RHI layer.
//!
//! This crate owns the frame loop: it creates the instance, device, and
//! swapchain for a window, records and submits command buffers every frame,
//! and recreates the swapchain-dependent resources when the window changes.
//!
//! The number of frames that may be in flight at once is
//! [`prism_rhi::sync::MAX_FRAMES_IN_FLIGHT`]; per-image resources (uniform
//! buffers, descriptor sets, command buffers) are instead sized to the
//! swapchain image count.

pub mod camera;
pub mod depth_buffer;
pub mod frame;
pub mod mesh;
pub mod ubo;

mod renderer;

pub use camera::Camera;
pub use mesh::Mesh;
pub use renderer::Renderer;
