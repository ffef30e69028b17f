//! Core utilities for the prism demo.
//!
//! This crate provides the foundational pieces shared by the other crates:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities

mod error;
mod logging;
mod timer;

pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
