//! Vulkan synchronization objects.
//!
//! Three wrappers cover everything the frame loop needs:
//! - [`Semaphore`] for GPU-to-GPU ordering across queue operations
//! - [`Fence`] for host-side waits on submitted work
//! - [`FrameSync`] bundling the per-slot set the renderer cycles through
//!
//! Each in-flight frame slot owns one [`FrameSync`]. The renderer waits on
//! the slot's fence before reusing it, waits on the image-available
//! semaphore at submit, and hands the render-finished semaphore to present.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Number of frame slots the renderer cycles through.
///
/// With two slots the CPU records frame N+1 while the GPU still works on
/// frame N; the fence wait at the top of the frame caps the lag at one.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Binary semaphore for queue-to-queue ordering.
///
/// Signaled by one queue operation, waited on by another. The frame loop
/// uses one per slot for image acquisition and one for render completion.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates an unsignaled semaphore.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created semaphore");

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed semaphore");
    }
}

/// Fence the host can wait on.
///
/// Signaled by the GPU when a submission completes. The frame loop waits
/// on a slot's fence before touching any of that slot's resources again.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence, optionally already signaled.
    ///
    /// A fence that will be waited on before the first submission that
    /// signals it must start signaled, or the first wait never returns.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence signals or `timeout` nanoseconds pass.
    ///
    /// Pass `u64::MAX` to wait without a deadline.
    ///
    /// # Errors
    ///
    /// Returns `vk::Result::TIMEOUT` as an error if the deadline expires,
    /// or any other failure from the wait.
    pub fn wait(&self, timeout: u64) -> Result<(), RhiError> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?
        };
        Ok(())
    }

    /// Returns the fence to the unsignaled state.
    ///
    /// Must not be called while a queue submission still references it.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> Result<(), RhiError> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }

    /// Polls the fence without blocking.
    pub fn is_signaled(&self) -> bool {
        let status = unsafe { self.device.handle().get_fence_status(self.fence) };
        matches!(status, Ok(true))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
        debug!("Destroyed fence");
    }
}

/// The synchronization objects owned by one frame slot.
///
/// Per frame the renderer:
/// 1. waits on and resets `in_flight_fence`
/// 2. acquires an image, signaling `image_available_semaphore`
/// 3. submits, waiting on image-available, signaling render-finished and
///    the fence
/// 4. presents, waiting on `render_finished_semaphore`
pub struct FrameSync {
    image_available_semaphore: Semaphore,
    render_finished_semaphore: Semaphore,
    in_flight_fence: Fence,
}

impl FrameSync {
    /// Creates the slot's two semaphores and its fence.
    ///
    /// The fence starts signaled so the slot's first frame does not block
    /// on work that was never submitted.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the objects fails to create.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let image_available_semaphore = Semaphore::new(device.clone())?;
        let render_finished_semaphore = Semaphore::new(device.clone())?;
        let in_flight_fence = Fence::new(device, true)?;

        info!("Created frame synchronization primitives");

        Ok(Self {
            image_available_semaphore,
            render_finished_semaphore,
            in_flight_fence,
        })
    }

    /// Returns the image-available semaphore.
    #[inline]
    pub fn image_available_semaphore(&self) -> &Semaphore {
        &self.image_available_semaphore
    }

    /// Returns the render-finished semaphore.
    #[inline]
    pub fn render_finished_semaphore(&self) -> &Semaphore {
        &self.render_finished_semaphore
    }

    /// Returns the in-flight fence.
    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight_fence
    }

    /// Raw handle of the image-available semaphore.
    #[inline]
    pub fn image_available_handle(&self) -> vk::Semaphore {
        self.image_available_semaphore.handle()
    }

    /// Raw handle of the render-finished semaphore.
    #[inline]
    pub fn render_finished_handle(&self) -> vk::Semaphore {
        self.render_finished_semaphore.handle()
    }

    /// Raw handle of the in-flight fence.
    #[inline]
    pub fn in_flight_fence_handle(&self) -> vk::Fence {
        self.in_flight_fence.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_frames_in_flight_constant() {
        assert!(MAX_FRAMES_IN_FLIGHT >= 1);
        assert!(MAX_FRAMES_IN_FLIGHT <= 4);
    }

    #[test]
    fn test_sync_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
        assert_send_sync::<FrameSync>();
    }
}
