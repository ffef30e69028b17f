//! Window and Vulkan surface creation on top of winit and ash-window.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use prism_core::{Error, Result};

/// Owns a `vk::SurfaceKHR` and destroys it on drop.
///
/// The Vulkan instance the surface was created against must outlive it;
/// the loader needed for teardown is stored inside.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Raw surface handle, valid while this wrapper is alive.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader for capability, format, and present-mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: handle and loader come from the same live instance,
        // and this is the only destruction site.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// The application window plus its last known physical size.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Opens a resizable window with the given size and title.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        tracing::info!("Window created: {}x{}", width, height);

        Ok(Self {
            window: Arc::new(window),
            width,
            height,
        })
    }

    /// The underlying winit window.
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Current width in physical pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current height in physical pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Records a new size from a resize event.
    ///
    /// Zero is a legal dimension; it means the window is minimized and
    /// the renderer pauses until a usable size arrives.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// True while either dimension is zero.
    pub fn is_zero_sized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Asks winit to schedule a redraw.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Creates a presentation surface for this window.
    ///
    /// # Errors
    ///
    /// Fails when the window or display handle is unavailable, or when
    /// surface creation itself fails.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: entry and instance are live, the handles come from a
        // live winit window, and Surface::drop is the only teardown path.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Vulkan(format!("Failed to create Vulkan surface: {}", e)))?
        };

        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }

    /// Instance extensions the current platform needs for presentation.
    ///
    /// The returned pointers reference static loader data and stay valid
    /// for the life of the process.
    ///
    /// # Errors
    ///
    /// Fails when the display handle is unavailable or enumeration fails.
    pub fn required_surface_extensions(&self) -> Result<Vec<*const i8>> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| Error::Vulkan(format!("Failed to enumerate required extensions: {}", e)))?;

        tracing::debug!(
            "Required Vulkan extensions for surface: {:?}",
            extensions
                .iter()
                // SAFETY: ash_window hands back static null-terminated strings
                .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
                .collect::<Vec<_>>()
        );

        Ok(extensions.to_vec())
    }
}
