//! Prism - Main Entry Point
//!
//! A small Vulkan demo that clears the screen and draws two spinning
//! colored quads. Escape or closing the window exits.

use std::path::Path;

use anyhow::Result;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use prism_core::Timer;
use prism_platform::Window;
use prism_renderer::Renderer;

const WINDOW_TITLE: &str = "Prism";
const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;

const VERTEX_SHADER_PATH: &str = "shaders/spirv/mesh.vert.spv";
const FRAGMENT_SHADER_PATH: &str = "shaders/spirv/mesh.frag.spv";

struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    timer: Timer,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new() -> Self {
        Self {
            window: None,
            renderer: None,
            timer: Timer::new(),
            fatal: None,
        }
    }

    /// Records a fatal error and stops the event loop. `main` surfaces
    /// the stored error so the process exits non-zero.
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        error!("{:#}", error);
        self.fatal = Some(error);
        event_loop.exit();
    }

    fn take_fatal(&mut self) -> Option<anyhow::Error> {
        self.fatal.take()
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            match Window::new(event_loop, WINDOW_WIDTH, WINDOW_HEIGHT, WINDOW_TITLE) {
                Ok(window) => {
                    match Renderer::new(
                        &window,
                        Path::new(VERTEX_SHADER_PATH),
                        Path::new(FRAGMENT_SHADER_PATH),
                    ) {
                        Ok(renderer) => {
                            info!("Initialization complete, entering main loop");
                            self.renderer = Some(renderer);
                            self.window = Some(window);
                            self.timer.reset();
                        }
                        Err(e) => {
                            self.fail(
                                event_loop,
                                anyhow::Error::new(e).context("Failed to create renderer"),
                            );
                        }
                    }
                }
                Err(e) => {
                    self.fail(
                        event_loop,
                        anyhow::Error::new(e).context("Failed to create window"),
                    );
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                info!("Window resized to {}x{}", size.width, size.height);
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                }
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let delta = self.timer.delta_secs();

                if let Some(ref mut renderer) = self.renderer {
                    renderer.update(delta);
                    if let Err(e) = renderer.draw_frame() {
                        self.fail(event_loop, anyhow::Error::new(e).context("Render error"));
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    info!("Escape pressed, shutting down");
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    prism_core::init_logging();
    info!("Starting {}", WINDOW_TITLE);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    // A fatal error inside the loop must reach the exit status
    match app.take_fatal() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_error_reaches_main() {
        let mut app = App::new();
        assert!(app.take_fatal().is_none());

        app.fatal = Some(anyhow::anyhow!("initialization failed"));

        let taken = app.take_fatal();
        assert!(taken.is_some());
        assert!(app.take_fatal().is_none());
    }
}
