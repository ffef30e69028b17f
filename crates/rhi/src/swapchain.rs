//! Swapchain creation, acquisition, and presentation.
//!
//! [`Swapchain`] owns the VkSwapchainKHR handle, its images, and one image
//! view per image. The selection helpers ([`choose_surface_format`],
//! [`choose_present_mode`], [`choose_extent`], [`determine_image_count`])
//! are pure functions over the queried surface support so the policy can be
//! unit tested without a device.
//!
//! Both [`Swapchain::acquire_next_image`] and [`Swapchain::present`] return
//! the raw `vk::Result` on failure rather than wrapping it, because the
//! frame loop needs to pattern-match `ERROR_OUT_OF_DATE_KHR` and
//! `SUBOPTIMAL_KHR` to drive recreation.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::RhiError;
use crate::instance::Instance;

/// What the surface supports, queried per physical device.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Image count bounds, extent bounds, supported transforms.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format and color space pairs.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries capabilities, formats, and present modes for the pair.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three surface queries fails.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self, RhiError> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Surface support: {} formats, {} present modes",
            formats.len(),
            present_modes.len()
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// A surface is usable once it offers at least one format and one
    /// present mode.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// The swapchain and its per-image views.
///
/// Not thread-safe; the frame loop is the single owner.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Creates a swapchain for the surface at the requested size.
    ///
    /// Format, present mode, extent, and image count all go through the
    /// selection helpers below. Images are created for color attachment
    /// use only.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface queries fail, the surface offers no
    /// formats or present modes, or swapchain/view creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<Self, RhiError> {
        Self::create_internal(
            instance,
            device,
            surface,
            width,
            height,
            vk::SwapchainKHR::null(),
        )
    }

    // Shared by initial creation and recreation; `old_swapchain` lets the
    // driver recycle resources across a resize.
    fn create_internal(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self, RhiError> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let support =
            SwapchainSupportDetails::query(device.physical_device(), surface, &surface_loader)?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Surface offers no formats or present modes".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = determine_image_count(&support.capabilities);

        info!(
            "Creating swapchain: {}x{}, {:?}/{:?}, {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            image_count
        );

        let queue_families = device.queue_families();
        let graphics_family = queue_families.graphics_family.ok_or_else(|| {
            RhiError::SwapchainError("Device has no graphics queue family".to_string())
        })?;
        let present_family = queue_families.present_family.ok_or_else(|| {
            RhiError::SwapchainError("Device has no present queue family".to_string())
        })?;

        // Split graphics/present families force concurrent image sharing
        let family_indices = [graphics_family, present_family];
        let (sharing_mode, family_slice) = if graphics_family != present_family {
            debug!(
                "Concurrent image sharing: graphics family {} vs present family {}",
                graphics_family, present_family
            );
            (vk::SharingMode::CONCURRENT, family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };
        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };

        // The driver may give more images than the requested minimum
        info!("Swapchain created with {} images", images.len());

        let image_views = create_image_views(&device, &images, surface_format.format)?;

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format: surface_format.format,
            color_space: surface_format.color_space,
            extent,
            present_mode,
        })
    }

    /// Replaces the swapchain with one matching the new size.
    ///
    /// Called after a resize, or after acquire/present report the
    /// swapchain out of date or suboptimal. Waits for the device to go
    /// idle first; the caller must have dropped everything that references
    /// the old swapchain images (framebuffers, recorded command buffers).
    ///
    /// # Errors
    ///
    /// Returns an error if the idle wait or recreation fails.
    pub fn recreate(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<(), RhiError> {
        self.device.wait_idle()?;

        info!("Recreating swapchain at {}x{}", width, height);

        self.destroy_image_views();

        let old_swapchain = self.swapchain;
        let mut replacement = Self::create_internal(
            instance,
            self.device.clone(),
            surface,
            width,
            height,
            old_swapchain,
        )?;

        unsafe {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }

        // Move the replacement's resources into self, then null out its
        // handle so its Drop has nothing to destroy
        self.swapchain = replacement.swapchain;
        self.images = std::mem::take(&mut replacement.images);
        self.image_views = std::mem::take(&mut replacement.image_views);
        self.format = replacement.format;
        self.color_space = replacement.color_space;
        self.extent = replacement.extent;
        self.present_mode = replacement.present_mode;
        replacement.swapchain = vk::SwapchainKHR::null();

        Ok(())
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    ///
    /// # Errors
    ///
    /// Returns the raw `vk::Result`; `ERROR_OUT_OF_DATE_KHR` means the
    /// caller must recreate the swapchain before acquiring again.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Queues presentation of `image_index`, waiting on `wait_semaphore`.
    ///
    /// Returns whether the swapchain is suboptimal.
    ///
    /// # Errors
    ///
    /// Returns the raw `vk::Result`; `ERROR_OUT_OF_DATE_KHR` means the
    /// image was not presented and the swapchain must be recreated.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the color space.
    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    /// Returns the current extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the current width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    /// Returns the current height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    /// Returns the present mode in use.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns how many images the swapchain actually has.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Returns the image at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    /// Returns the view for the image at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    /// Returns all swapchain images.
    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Returns all image views, indexed by image.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn destroy_image_views(&mut self) {
        for &view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(view, None);
            }
        }
        self.image_views.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();

        // Null after recreate moved the handle out; images belong to the
        // swapchain and go with it
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.swapchain_loader
                    .destroy_swapchain(self.swapchain, None);
            }
            info!(
                "Swapchain destroyed ({}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
    }
}

/// Picks the surface format.
///
/// A single UNDEFINED entry means the surface takes anything, so RGBA8
/// UNORM is used directly. Otherwise the first RGBA8 or BGRA8 UNORM entry
/// with the SRGB_NONLINEAR color space wins, and failing that the surface's
/// first format is used as-is.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        debug!("Surface accepts any format, using R8G8B8A8_UNORM");
        return vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
    }

    let preferred = formats.iter().find(|f| {
        matches!(
            f.format,
            vk::Format::R8G8B8A8_UNORM | vk::Format::B8G8R8A8_UNORM
        ) && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match preferred {
        Some(&format) => {
            debug!("Surface format: {:?}", format.format);
            format
        }
        None => {
            warn!(
                "No preferred surface format, falling back to {:?}",
                formats[0].format
            );
            formats[0]
        }
    }
}

/// Picks the present mode: MAILBOX when available, FIFO otherwise.
///
/// FIFO is the only mode the Vulkan spec guarantees, so it is the
/// unconditional fallback.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Present mode: MAILBOX");
        vk::PresentModeKHR::MAILBOX
    } else {
        debug!("Present mode: FIFO");
        vk::PresentModeKHR::FIFO
    }
}

/// Picks the swapchain extent.
///
/// A fixed `current_extent` is used verbatim. The sentinel `u32::MAX`
/// means the window system defers to the swapchain, in which case the
/// framebuffer size is clamped into the surface's min/max bounds.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Picks the image count: one above the minimum, capped by the maximum.
///
/// A maximum of zero means unbounded.
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, RhiError> {
    let subresource_range = vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1);

    let views = images
        .iter()
        .enumerate()
        .map(|(i, &image)| {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(subresource_range);

            unsafe {
                device
                    .handle()
                    .create_image_view(&create_info, None)
                    .map_err(|e| {
                        RhiError::SwapchainError(format!(
                            "Failed to create image view {}: {:?}",
                            i, e
                        ))
                    })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Created {} swapchain image views", views.len());
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format_entry(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn test_surface_format_any_format_surface() {
        // A single UNDEFINED entry means the surface takes anything
        let formats = [format_entry(
            vk::Format::UNDEFINED,
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
        )];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_surface_format_prefers_rgba8_unorm() {
        let formats = [
            format_entry(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format_entry(
                vk::Format::R8G8B8A8_UNORM,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            ),
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_surface_format_accepts_bgra8_unorm() {
        let formats = [
            format_entry(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format_entry(
                vk::Format::B8G8R8A8_UNORM,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            ),
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn test_surface_format_wrong_color_space_falls_back() {
        // A preferred format in the wrong color space does not count
        let formats = [
            format_entry(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format_entry(
                vk::Format::R8G8B8A8_UNORM,
                vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            ),
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_surface_format_falls_back_to_first() {
        let formats = [format_entry(
            vk::Format::R5G6B5_UNORM_PACK16,
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
        )];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R5G6B5_UNORM_PACK16);
    }

    #[test]
    fn test_present_mode_prefers_mailbox() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);

        // FIFO is assumed even when the list omits it
        let modes = [vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_extent_uses_fixed_current_extent() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn test_extent_clamps_when_window_system_defers() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let too_big = choose_extent(&capabilities, 3000, 3000);
        assert_eq!((too_big.width, too_big.height), (2000, 2000));

        let too_small = choose_extent(&capabilities, 50, 50);
        assert_eq!((too_small.width, too_small.height), (100, 100));

        let in_range = choose_extent(&capabilities, 800, 600);
        assert_eq!((in_range.width, in_range.height), (800, 600));
    }

    #[test]
    fn test_image_count_selection() {
        let with_limits = |min, max| vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        };

        // min+1, capped by the maximum
        assert_eq!(determine_image_count(&with_limits(2, 3)), 3);
        assert_eq!(determine_image_count(&with_limits(2, 8)), 3);
        // max == 0 means unbounded
        assert_eq!(determine_image_count(&with_limits(2, 0)), 3);
        // min == max forces the count down
        assert_eq!(determine_image_count(&with_limits(2, 2)), 2);
    }

    #[test]
    fn test_support_adequacy() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupportDetails {
            formats: vec![],
            ..adequate.clone()
        };
        assert!(!no_formats.is_adequate());

        let no_modes = SwapchainSupportDetails {
            present_modes: vec![],
            ..adequate
        };
        assert!(!no_modes.is_adequate());
    }
}
