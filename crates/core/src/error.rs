//! Error types shared above the Vulkan layer.

use thiserror::Error;

/// Top-level error type for the demo.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Shader or other asset loading errors
    #[error("Asset error: {0}")]
    Asset(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the demo's Error type.
pub type Result<T> = std::result::Result<T, Error>;
