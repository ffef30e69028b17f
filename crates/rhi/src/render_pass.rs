//! Render pass and framebuffer management.
//!
//! This module wraps VkRenderPass and VkFramebuffer for the classic
//! render pass path: one color attachment (the swapchain image) and one
//! depth attachment, cleared at the start of the pass and transitioned
//! to their final layouts at the end.
//!
//! # Overview
//!
//! - [`RenderPass`] describes the attachment load/store operations and
//!   layout transitions for a single subpass
//! - [`Framebuffers`] holds one framebuffer per swapchain image, all
//!   sharing the same depth attachment
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use prism_rhi::device::Device;
//! use prism_rhi::render_pass::RenderPass;
//!
//! # fn example(device: Arc<Device>) -> Result<(), prism_rhi::RhiError> {
//! let render_pass = RenderPass::new(
//!     device,
//!     vk::Format::B8G8R8A8_UNORM,
//!     vk::Format::D32_SFLOAT,
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan render pass wrapper.
///
/// The render pass has a single subpass with one color and one depth
/// attachment. Both are cleared on load. The color attachment ends the
/// pass in `PRESENT_SRC_KHR` layout so the image can go straight to the
/// presentation engine.
///
/// Two subpass dependencies bracket the pass: one ordering the clear
/// after any previous reads of the swapchain image, and one ordering
/// presentation after the color writes.
///
/// # Thread Safety
///
/// The render pass is immutable after creation and can be safely shared
/// between threads.
pub struct RenderPass {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan render pass handle.
    render_pass: vk::RenderPass,
    /// Color attachment format (matches the swapchain).
    color_format: vk::Format,
    /// Depth attachment format.
    depth_format: vk::Format,
}

impl RenderPass {
    /// Creates a render pass for the given color and depth formats.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `color_format` - Format of the swapchain images
    /// * `depth_format` - Format of the depth attachment
    ///
    /// # Errors
    ///
    /// Returns an error if render pass creation fails.
    pub fn new(
        device: Arc<Device>,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RhiResult<Self> {
        let color_attachment = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let depth_attachment = vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let attachments = [color_attachment, depth_attachment];

        let color_ref = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let depth_ref = vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let color_refs = [color_ref];

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref);

        let subpasses = [subpass];

        // The presentation engine must finish reading the image before the
        // clear, and our attachment writes must complete before it reads
        // the image again.
        let dependencies = [
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
                .src_access_mask(vk::AccessFlags::MEMORY_READ)
                .dst_stage_mask(
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                )
                .dst_access_mask(
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                ),
            vk::SubpassDependency::default()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                )
                .src_access_mask(
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                )
                .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
                .dst_access_mask(vk::AccessFlags::MEMORY_READ),
        ];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };

        debug!(
            "Created render pass: color={:?}, depth={:?}",
            color_format, depth_format
        );

        Ok(Self {
            device,
            render_pass,
            color_format,
            depth_format,
        })
    }

    /// Returns the Vulkan render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Returns the color attachment format.
    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    /// Returns the depth attachment format.
    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_render_pass(self.render_pass, None);
        }
        debug!("Destroyed render pass");
    }
}

/// One framebuffer per swapchain image.
///
/// All framebuffers share the same depth attachment view, which is valid
/// because only one frame renders into the depth buffer at a time.
pub struct Framebuffers {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Framebuffer handles, indexed by swapchain image index.
    framebuffers: Vec<vk::Framebuffer>,
    /// Framebuffer dimensions.
    extent: vk::Extent2D,
}

impl Framebuffers {
    /// Creates a framebuffer for each swapchain image view.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `render_pass` - The render pass the framebuffers will be used with
    /// * `color_views` - Swapchain image views, one framebuffer per view
    /// * `depth_view` - Shared depth attachment view
    /// * `extent` - Framebuffer dimensions (must match the swapchain)
    ///
    /// # Errors
    ///
    /// Returns an error if framebuffer creation fails. Any framebuffers
    /// created before the failure are destroyed before returning.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let mut framebuffers = Vec::with_capacity(color_views.len());

        for &color_view in color_views {
            let attachments = [color_view, depth_view];

            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass.handle())
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = match unsafe { device.handle().create_framebuffer(&create_info, None) }
            {
                Ok(fb) => fb,
                Err(e) => {
                    for fb in framebuffers.drain(..) {
                        unsafe { device.handle().destroy_framebuffer(fb, None) };
                    }
                    return Err(e.into());
                }
            };

            framebuffers.push(framebuffer);
        }

        debug!(
            "Created {} framebuffer(s): {}x{}",
            framebuffers.len(),
            extent.width,
            extent.height
        );

        Ok(Self {
            device,
            framebuffers,
            extent,
        })
    }

    /// Returns the framebuffer for the given swapchain image index.
    #[inline]
    pub fn get(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    /// Returns the number of framebuffers.
    #[inline]
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    /// Returns true if no framebuffers exist.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// Returns the framebuffer dimensions.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        for framebuffer in self.framebuffers.drain(..) {
            unsafe {
                self.device.handle().destroy_framebuffer(framebuffer, None);
            }
        }
        debug!("Destroyed framebuffers");
    }
}
