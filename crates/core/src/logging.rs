//! Logging setup.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global tracing subscriber.
///
/// Output goes to stderr. `RUST_LOG` overrides the filter; the default
/// keeps the rendering crates at debug so resource creation and
/// teardown show up during development. Call once at startup.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,prism_rhi=debug,prism_renderer=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
