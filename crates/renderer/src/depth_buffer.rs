//! Depth attachment for the render pass.
//!
//! One depth image backs every framebuffer; the render pass clears it each
//! frame and transitions it into its attachment layout, so no explicit
//! barrier is issued here. The image lives in GPU-only memory and is
//! recreated together with the swapchain whenever the extent changes.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, info};

use prism_rhi::device::Device;
use prism_rhi::{RhiError, RhiResult};

/// Default depth format, 32-bit float with no stencil.
pub const DEFAULT_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Depth image plus its view, sized to the swapchain extent.
///
/// Teardown order on drop: view, image, then the memory allocation.
pub struct DepthBuffer {
    device: Arc<Device>,
    image: vk::Image,
    image_view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl DepthBuffer {
    /// Creates a depth buffer of the given size and format.
    ///
    /// # Errors
    ///
    /// Fails if either dimension is zero, or if image creation, memory
    /// allocation, or view creation fails.
    pub fn new(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
    ) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::InvalidHandle(
                "Depth buffer dimensions must be greater than 0".to_string(),
            ));
        }

        let extent = vk::Extent2D { width, height };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: "depth_buffer",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false, // Optimal tiling is not linear
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let image_view = unsafe { device.handle().create_image_view(&view_info, None)? };

        info!("Created depth buffer: {}x{} ({:?})", width, height, format);

        Ok(Self {
            device,
            image,
            image_view,
            allocation: Some(allocation),
            format,
            extent,
        })
    }

    /// Creates a depth buffer with [`DEFAULT_DEPTH_FORMAT`].
    ///
    /// # Errors
    ///
    /// Same failure modes as [`DepthBuffer::new`].
    pub fn with_default_format(device: Arc<Device>, width: u32, height: u32) -> RhiResult<Self> {
        Self::new(device, width, height, DEFAULT_DEPTH_FORMAT)
    }

    /// Returns the depth image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Returns the depth image view handle.
    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Returns the depth format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the buffer's width and height.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_image_view(self.image_view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free depth buffer allocation: {:?}", e);
            }
        }

        debug!(
            "Destroyed depth buffer: {}x{}",
            self.extent.width, self.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_depth_format() {
        assert_eq!(DEFAULT_DEPTH_FORMAT, vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_depth_format_is_depth_only() {
        // The depth aspect mask assumes a format without a stencil component
        assert!(matches!(
            DEFAULT_DEPTH_FORMAT,
            vk::Format::D32_SFLOAT | vk::Format::D16_UNORM
        ));
    }
}
