//! Platform abstraction layer for the prism demo.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation via ash-window

mod window;

pub use window::{Surface, Window};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
