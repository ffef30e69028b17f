//! Vulkan abstraction layer for the prism demo.
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance and device creation
//! - Swapchain management and recreation
//! - Render pass and framebuffer setup
//! - Command buffer recording
//! - Buffer management and staging uploads
//! - Pipeline creation
//! - Synchronization primitives
//! - Deferred destruction of swapchain-dependent resources

mod error;

pub mod buffer;
pub mod command;
pub mod deletion;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
