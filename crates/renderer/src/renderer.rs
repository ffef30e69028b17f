//! Main renderer orchestration.
//!
//! This module provides the main [`Renderer`] struct that coordinates
//! all Vulkan resources and drives the per-frame
//! acquire → record → submit → present loop.

use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Vec3};
use tracing::{debug, error, info};

use prism_platform::{Surface, Window};
use prism_rhi::buffer::{Buffer, BufferUsage};
use prism_rhi::command::{CommandBuffer, CommandPool};
use prism_rhi::deletion::DeletionQueue;
use prism_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, buffer_info,
    update_descriptor_sets,
};
use prism_rhi::device::Device;
use prism_rhi::instance::Instance;
use prism_rhi::physical_device::select_physical_device;
use prism_rhi::pipeline::{FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use prism_rhi::render_pass::{Framebuffers, RenderPass};
use prism_rhi::shader::{Shader, ShaderStage};
use prism_rhi::swapchain::Swapchain;
use prism_rhi::sync::{FrameSync, MAX_FRAMES_IN_FLIGHT};
use prism_rhi::vertex::Vertex;
use prism_rhi::{RhiError, RhiResult};

use crate::camera::Camera;
use crate::depth_buffer::{DEFAULT_DEPTH_FORMAT, DepthBuffer};
use crate::frame::{FrameSlots, build_draw_list};
use crate::mesh::Mesh;
use crate::ubo::{PUSH_CONSTANT_SIZE, ViewProjection};

/// Clear color for the color attachment (dark blue-gray).
const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.15, 1.0];

/// Resources that live exactly as long as one swapchain incarnation.
///
/// The whole bundle is torn down through a [`DeletionQueue`] and rebuilt
/// whenever the swapchain is recreated. Counts of per-image entries always
/// equal the current swapchain image count.
struct ImageResources {
    /// Shared depth attachment, sized to the swapchain extent.
    depth_buffer: DepthBuffer,
    /// One framebuffer per swapchain image.
    framebuffers: Framebuffers,
    /// One view-projection uniform buffer per swapchain image.
    uniform_buffers: Vec<Buffer>,
    /// Pool the per-image descriptor sets come from.
    descriptor_pool: DescriptorPool,
    /// One descriptor set per swapchain image.
    descriptor_sets: Vec<vk::DescriptorSet>,
    /// One command buffer per swapchain image, re-recorded every frame.
    command_buffers: Vec<vk::CommandBuffer>,
}

/// Main renderer that manages all Vulkan resources.
///
/// # Resource Destruction Order
///
/// Vulkan resources must be destroyed in the correct order:
/// 1. Wait for all GPU work to complete
/// 2. Flush the swapchain-dependent bundle (deletion queue)
/// 3. Destroy per-slot sync objects and mesh buffers
/// 4. Destroy pipeline, render pass, and command pool
/// 5. Destroy swapchain, surface, device, instance
///
/// ManuallyDrop enforces this order for the long-lived objects; the
/// deletion queue handles the swapchain-dependent subset.
pub struct Renderer {
    /// Vulkan instance (destroyed last).
    instance: ManuallyDrop<Instance>,
    /// Logical device (destroyed just before the instance).
    device: ManuallyDrop<Arc<Device>>,
    /// Window surface (destroyed after the swapchain).
    surface: ManuallyDrop<Surface>,
    /// Swapchain (recreated on resize).
    swapchain: ManuallyDrop<Swapchain>,

    /// Render pass shared by all framebuffers.
    render_pass: ManuallyDrop<RenderPass>,
    /// Layout of the per-image view-projection descriptor set.
    descriptor_set_layout: ManuallyDrop<DescriptorSetLayout>,
    /// Pipeline layout: one descriptor set plus the model push constant.
    pipeline_layout: ManuallyDrop<PipelineLayout>,
    /// The one graphics pipeline.
    pipeline: ManuallyDrop<Pipeline>,
    /// Graphics command pool backing the per-image command buffers.
    command_pool: ManuallyDrop<CommandPool>,

    /// Swapchain-dependent bundle; `None` only during recreation.
    image_resources: Option<ImageResources>,

    /// Demo geometry.
    meshes: Vec<Mesh>,
    /// Per-slot synchronization objects.
    frame_sync: Vec<FrameSync>,
    /// Frame slot counter.
    slots: FrameSlots,

    /// Scene camera.
    camera: Camera,

    /// Flag indicating the swapchain must be recreated.
    framebuffer_resized: bool,
    /// Current framebuffer width (may be zero while minimized).
    width: u32,
    /// Current framebuffer height (may be zero while minimized).
    height: u32,
}

impl Renderer {
    /// Creates a new renderer for the given window.
    ///
    /// # Arguments
    ///
    /// * `window` - The window to render to
    /// * `vertex_shader_path` - Path to the vertex shader SPIR-V
    /// * `fragment_shader_path` - Path to the fragment shader SPIR-V
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan resource creation fails or a required
    /// layer or extension is missing.
    pub fn new(
        window: &Window,
        vertex_shader_path: &Path,
        fragment_shader_path: &Path,
    ) -> RhiResult<Self> {
        let width = window.width();
        let height = window.height();

        info!("Initializing Vulkan renderer ({}x{})", width, height);

        // Validation layers in debug builds only
        let enable_validation = cfg!(debug_assertions);

        let surface_extensions = window
            .required_surface_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let instance = Instance::new(&surface_extensions, enable_validation)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;

        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;

        let render_pass =
            RenderPass::new(device.clone(), swapchain.format(), DEFAULT_DEPTH_FORMAT)?;

        // Binding 0: view-projection UBO, vertex stage only
        let vp_binding = DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &[vp_binding])?;

        // The model matrix travels as a vertex-stage push constant
        let push_constant_range = vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: PUSH_CONSTANT_SIZE as u32,
        };

        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[descriptor_set_layout.handle()],
            &[push_constant_range],
        )?;

        let pipeline = Self::create_pipeline(
            device.clone(),
            &pipeline_layout,
            &render_pass,
            vertex_shader_path,
            fragment_shader_path,
        )?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let meshes = Self::create_demo_meshes(device.clone(), &command_pool)?;

        let frame_sync = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        let image_resources = Self::create_image_resources(
            &device,
            &command_pool,
            &swapchain,
            &render_pass,
            &descriptor_set_layout,
        )?;

        let camera = Camera::new(
            Vec3::new(0.0, 0.0, 4.0),
            Vec3::ZERO,
            width as f32 / height as f32,
        );

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight, {} meshes",
            swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT,
            meshes.len()
        );

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            swapchain: ManuallyDrop::new(swapchain),
            render_pass: ManuallyDrop::new(render_pass),
            descriptor_set_layout: ManuallyDrop::new(descriptor_set_layout),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            pipeline: ManuallyDrop::new(pipeline),
            command_pool: ManuallyDrop::new(command_pool),
            image_resources: Some(image_resources),
            meshes,
            frame_sync,
            slots: FrameSlots::new(MAX_FRAMES_IN_FLIGHT),
            camera,
            framebuffer_resized: false,
            width,
            height,
        })
    }

    /// Creates the graphics pipeline from the shader pair.
    fn create_pipeline(
        device: Arc<Device>,
        layout: &PipelineLayout,
        render_pass: &RenderPass,
        vertex_shader_path: &Path,
        fragment_shader_path: &Path,
    ) -> RhiResult<Pipeline> {
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            vertex_shader_path,
            ShaderStage::Vertex,
            "main",
        )?;

        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            fragment_shader_path,
            ShaderStage::Fragment,
            "main",
        )?;

        // The Y-flipped projection flips the winding order, so front
        // faces arrive clockwise; back faces are culled as usual.
        GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .front_face(FrontFace::Clockwise)
            .build(device, layout, render_pass, 0)
    }

    /// Uploads the two demo quads.
    fn create_demo_meshes(
        device: Arc<Device>,
        command_pool: &CommandPool,
    ) -> RhiResult<Vec<Mesh>> {
        let quad_indices: [u32; 6] = [0, 1, 2, 2, 3, 0];

        let left_vertices = [
            Vertex::new(Vec3::new(-0.4, 0.4, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            Vertex::new(Vec3::new(-0.4, -0.4, 0.0), Vec3::new(0.0, 1.0, 0.0)),
            Vertex::new(Vec3::new(0.4, -0.4, 0.0), Vec3::new(0.0, 0.0, 1.0)),
            Vertex::new(Vec3::new(0.4, 0.4, 0.0), Vec3::new(1.0, 1.0, 0.0)),
        ];

        let right_vertices = [
            Vertex::new(Vec3::new(-0.4, 0.4, 0.0), Vec3::new(0.0, 1.0, 1.0)),
            Vertex::new(Vec3::new(-0.4, -0.4, 0.0), Vec3::new(1.0, 0.0, 1.0)),
            Vertex::new(Vec3::new(0.4, -0.4, 0.0), Vec3::new(1.0, 1.0, 1.0)),
            Vertex::new(Vec3::new(0.4, 0.4, 0.0), Vec3::new(0.0, 1.0, 0.0)),
        ];

        let mut left = Mesh::new(device.clone(), command_pool, &left_vertices, &quad_indices)?;
        left.set_model(Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0)));

        let mut right = Mesh::new(device, command_pool, &right_vertices, &quad_indices)?;
        right.set_model(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));

        Ok(vec![left, right])
    }

    /// Creates the swapchain-dependent resource bundle.
    fn create_image_resources(
        device: &Arc<Device>,
        command_pool: &CommandPool,
        swapchain: &Swapchain,
        render_pass: &RenderPass,
        descriptor_set_layout: &DescriptorSetLayout,
    ) -> RhiResult<ImageResources> {
        let extent = swapchain.extent();
        let image_count = swapchain.image_count() as usize;

        let depth_buffer =
            DepthBuffer::with_default_format(device.clone(), extent.width, extent.height)?;

        let framebuffers = Framebuffers::new(
            device.clone(),
            render_pass,
            swapchain.image_views(),
            depth_buffer.image_view(),
            extent,
        )?;

        // Per-image uniform buffers, because image count and frame slot
        // count are independent
        let uniform_buffers = (0..image_count)
            .map(|_| Buffer::new(device.clone(), BufferUsage::Uniform, ViewProjection::SIZE as u64))
            .collect::<RhiResult<Vec<_>>>()?;

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(image_count as u32)];
        let descriptor_pool =
            DescriptorPool::new(device.clone(), image_count as u32, &pool_sizes)?;

        let layouts = vec![descriptor_set_layout.handle(); image_count];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;

        for (set, buffer) in descriptor_sets.iter().zip(&uniform_buffers) {
            let infos = [buffer_info(buffer.handle(), 0, ViewProjection::SIZE as u64)];
            let write = vk::WriteDescriptorSet::default()
                .dst_set(*set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&infos);
            update_descriptor_sets(device, &[write]);
        }

        let command_buffers = command_pool.allocate_command_buffers(image_count as u32)?;

        debug!(
            "Created swapchain-dependent resources for {} image(s)",
            image_count
        );

        Ok(ImageResources {
            depth_buffer,
            framebuffers,
            uniform_buffers,
            descriptor_pool,
            descriptor_sets,
            command_buffers,
        })
    }

    /// Tears down the swapchain-dependent bundle in reverse creation order.
    fn destroy_image_resources(&mut self) {
        let Some(resources) = self.image_resources.take() else {
            return;
        };

        let ImageResources {
            depth_buffer,
            framebuffers,
            uniform_buffers,
            descriptor_pool,
            descriptor_sets: _,
            command_buffers,
        } = resources;

        let device = (*self.device).clone();
        let pool = self.command_pool.handle();

        // Pushed in creation order; flush runs them in reverse
        let mut deletion_queue = DeletionQueue::new();
        deletion_queue.push(move || drop(depth_buffer));
        deletion_queue.push(move || drop(framebuffers));
        deletion_queue.push(move || drop(uniform_buffers));
        deletion_queue.push(move || drop(descriptor_pool));
        deletion_queue.push(move || unsafe {
            device.handle().free_command_buffers(pool, &command_buffers);
        });
        deletion_queue.flush();
    }

    /// Notifies the renderer that the window has been resized.
    ///
    /// The actual swapchain recreation happens on the next frame. A zero
    /// dimension marks the window as minimized and suspends drawing.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }

        debug!(
            "Resize: {}x{} -> {}x{}",
            self.width, self.height, width, height
        );
        self.width = width;
        self.height = height;

        if width > 0 && height > 0 {
            self.framebuffer_resized = true;
        }
    }

    /// Advances the demo animation.
    ///
    /// # Arguments
    ///
    /// * `delta_seconds` - Time elapsed since the last frame in seconds
    pub fn update(&mut self, delta_seconds: f32) {
        let angle = delta_seconds * std::f32::consts::FRAC_PI_2;
        if let [left, right] = self.meshes.as_mut_slice() {
            left.spin(angle);
            right.spin(-angle);
        }
    }

    /// Recreates the swapchain and every swapchain-dependent resource.
    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        if self.width == 0 || self.height == 0 {
            debug!("Skipping swapchain recreation while minimized");
            return Ok(());
        }

        self.device.wait_idle()?;

        self.destroy_image_resources();

        self.swapchain.recreate(
            &self.instance,
            self.surface.handle(),
            self.width,
            self.height,
        )?;

        let resources = Self::create_image_resources(
            &self.device,
            &self.command_pool,
            &self.swapchain,
            &self.render_pass,
            &self.descriptor_set_layout,
        )?;
        self.image_resources = Some(resources);

        self.camera
            .set_aspect(self.width as f32 / self.height as f32);

        self.framebuffer_resized = false;

        info!(
            "Swapchain recreated: {}x{}, {} images",
            self.swapchain.width(),
            self.swapchain.height(),
            self.swapchain.image_count()
        );
        Ok(())
    }

    /// Renders one frame.
    ///
    /// Out-of-date and suboptimal swapchain conditions trigger recreation
    /// and are never returned as errors. Drawing is suspended while the
    /// framebuffer size is zero.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan operation fails.
    pub fn draw_frame(&mut self) -> RhiResult<()> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }

        if self.framebuffer_resized {
            debug!("Resize pending, recreating swapchain before acquire");
            self.recreate_swapchain()?;
        }

        let slot = self.slots.current();
        let sync = &self.frame_sync[slot];

        // 1. Wait for this slot's previous work to complete
        sync.in_flight_fence().wait(u64::MAX)?;

        // 2. Acquire the next swapchain image
        let (image_index, _suboptimal) =
            match self.swapchain.acquire_next_image(sync.image_available_handle()) {
                Ok(result) => result,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    // Fence not yet reset, so retrying next frame cannot deadlock
                    debug!("Swapchain out of date at acquire, recreating");
                    self.recreate_swapchain()?;
                    return Ok(());
                }
                Err(e) => return Err(RhiError::VulkanError(e)),
            };

        // Reset the fence only once a frame will actually be submitted
        sync.in_flight_fence().reset()?;

        // 3. Write the camera matrices into the acquired image's UBO
        self.update_uniform_buffer(image_index)?;

        // 4. Re-record the acquired image's command buffer
        self.record_commands(image_index)?;

        let resources = self
            .image_resources
            .as_ref()
            .ok_or_else(|| RhiError::SwapchainError("image resources missing".to_string()))?;

        // 5. Submit: wait image-available, signal render-finished and the fence
        let wait_semaphores = [sync.image_available_handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished_handle()];
        let command_buffers = [resources.command_buffers[image_index as usize]];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .submit_graphics(&[submit_info], sync.in_flight_fence_handle())?;
        }

        // 6. Present, waiting on render-finished
        let present_result = self.swapchain.present(
            self.device.present_queue(),
            image_index,
            sync.render_finished_handle(),
        );

        // 7. Advance to the next frame slot
        self.slots.advance();

        let needs_recreate = match present_result {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => true,
            Err(e) => return Err(RhiError::VulkanError(e)),
        };

        if needs_recreate {
            debug!("Swapchain stale at present, recreating");
            self.recreate_swapchain()?;
        }

        Ok(())
    }

    /// Writes the camera matrices into the given image's uniform buffer.
    fn update_uniform_buffer(&self, image_index: u32) -> RhiResult<()> {
        let resources = self
            .image_resources
            .as_ref()
            .ok_or_else(|| RhiError::SwapchainError("image resources missing".to_string()))?;

        let vp = ViewProjection::new(self.camera.projection_matrix(), self.camera.view_matrix());
        resources.uniform_buffers[image_index as usize].write_data(0, bytemuck::bytes_of(&vp))
    }

    /// Re-records the command buffer for the acquired swapchain image.
    fn record_commands(&self, image_index: u32) -> RhiResult<()> {
        let resources = self
            .image_resources
            .as_ref()
            .ok_or_else(|| RhiError::SwapchainError("image resources missing".to_string()))?;

        let extent = self.swapchain.extent();
        let cmd = CommandBuffer::from_handle(
            (*self.device).clone(),
            resources.command_buffers[image_index as usize],
        );

        cmd.reset()?;
        cmd.begin()?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        cmd.begin_render_pass(
            self.render_pass.handle(),
            resources.framebuffers.get(image_index),
            render_area,
            &clear_values,
        );

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        cmd.set_viewport(&viewport);
        cmd.set_scissor(&render_area);

        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());

        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline_layout.handle(),
            0,
            &[resources.descriptor_sets[image_index as usize]],
            &[],
        );

        for draw in build_draw_list(&self.meshes) {
            let mesh = &self.meshes[draw.mesh_index];

            cmd.bind_vertex_buffers(0, &[mesh.vertex_buffer().handle()], &[0]);
            cmd.bind_index_buffer(mesh.index_buffer().handle(), 0, vk::IndexType::UINT32);
            cmd.push_constants(
                self.pipeline_layout.handle(),
                vk::ShaderStageFlags::VERTEX,
                0,
                &draw.model,
            );
            cmd.draw_indexed(draw.index_count, 1, 0, 0, 0);
        }

        cmd.end_render_pass();
        cmd.end()?;

        Ok(())
    }

    /// Returns the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Returns the swapchain image format.
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Wait for all GPU work to complete before destroying resources
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during drop: {:?}", e);
        }

        self.destroy_image_resources();
        self.frame_sync.clear();
        self.meshes.clear();

        // Long-lived objects in reverse creation order; every Arc<Device>
        // clone is gone by the time the device itself drops
        unsafe {
            ManuallyDrop::drop(&mut self.pipeline);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            ManuallyDrop::drop(&mut self.descriptor_set_layout);
            ManuallyDrop::drop(&mut self.render_pass);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}
