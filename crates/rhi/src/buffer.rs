//! Buffers and the staging upload path.
//!
//! [`Buffer`] pairs a VkBuffer with a gpu-allocator allocation. The
//! [`BufferUsage`] enum picks both the Vulkan usage flags and the memory
//! location: geometry is device-local and reached through
//! [`Buffer::device_local_with_data`], while uniform and staging buffers
//! live in mapped CpuToGpu memory and are written directly with
//! [`Buffer::write_data`].

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::command::CommandPool;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// What a buffer is for; determines usage flags and memory location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Device-local vertex data, filled via staging.
    Vertex,
    /// Device-local index data, filled via staging.
    Index,
    /// Mapped uniform data, rewritten by the CPU every frame.
    Uniform,
    /// Mapped transfer source for uploads.
    Staging,
}

impl BufferUsage {
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    /// Lowercase name used in logs and allocation tags.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// A VkBuffer plus its memory allocation.
///
/// Not thread-safe; synchronize externally if shared.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates an uninitialized buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Fails on a zero size, or if buffer creation, allocation, or
    /// binding fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: usage.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        })
    }

    /// Creates a mapped buffer prefilled with `data`.
    ///
    /// Only valid for usages with mapped memory; device-local usages go
    /// through [`Buffer::device_local_with_data`].
    ///
    /// # Errors
    ///
    /// Returns an error if creation or the initial write fails.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Creates a device-local buffer and fills it through staging.
    ///
    /// A mapped staging buffer takes the data, a one-shot command buffer
    /// copies it across on the graphics queue, and the staging buffer is
    /// dropped before returning. Synchronous; meant for load-time
    /// geometry uploads.
    ///
    /// # Errors
    ///
    /// Returns an error if `usage` is not device-local, or if any buffer
    /// creation, recording, or submission step fails.
    pub fn device_local_with_data(
        device: Arc<Device>,
        command_pool: &CommandPool,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        if usage.memory_location() != MemoryLocation::GpuOnly {
            return Err(RhiError::InvalidHandle(format!(
                "device_local_with_data requires a device-local usage, got {}",
                usage.name()
            )));
        }

        let staging = Self::new_with_data(device.clone(), BufferUsage::Staging, data)?;
        let dst = Self::new(device.clone(), usage, data.len() as vk::DeviceSize)?;

        command_pool.execute_one_shot(|cmd| {
            let region = vk::BufferCopy::default().size(data.len() as vk::DeviceSize);
            unsafe {
                device
                    .handle()
                    .cmd_copy_buffer(cmd, staging.handle(), dst.handle(), &[region]);
            }
        })?;

        debug!(
            "Uploaded {} bytes to device-local {} buffer",
            data.len(),
            usage.name()
        );

        Ok(dst)
    }

    /// Copies `data` into the mapped allocation at `offset`.
    ///
    /// # Errors
    ///
    /// Fails if the write would run past the end of the buffer or if the
    /// memory is not mapped (device-local usages).
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        check_write_bounds(offset, data.len(), self.size)?;

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::InvalidHandle("Buffer allocation is not available".to_string())
        })?;

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        unsafe {
            let dst = mapped_ptr.as_ptr().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst as *mut u8, data.len());
        }

        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the usage this buffer was created with.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

fn check_write_bounds(offset: vk::DeviceSize, len: usize, size: vk::DeviceSize) -> RhiResult<()> {
    let end = offset + len as vk::DeviceSize;
    if end > size {
        return Err(RhiError::InvalidHandle(format!(
            "Write exceeds buffer size: offset {} + data {} > buffer {}",
            offset, len, size
        )));
    }
    Ok(())
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free buffer allocation: {:?}", e);
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_flags() {
        let vertex = BufferUsage::Vertex.to_vk_usage();
        assert!(vertex.contains(vk::BufferUsageFlags::VERTEX_BUFFER));
        assert!(vertex.contains(vk::BufferUsageFlags::TRANSFER_DST));

        let index = BufferUsage::Index.to_vk_usage();
        assert!(index.contains(vk::BufferUsageFlags::INDEX_BUFFER));
        assert!(index.contains(vk::BufferUsageFlags::TRANSFER_DST));

        assert!(
            BufferUsage::Uniform
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
        );
        assert!(
            BufferUsage::Staging
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::TRANSFER_SRC)
        );
    }

    #[test]
    fn test_memory_locations() {
        assert_eq!(
            BufferUsage::Vertex.memory_location(),
            MemoryLocation::GpuOnly
        );
        assert_eq!(
            BufferUsage::Index.memory_location(),
            MemoryLocation::GpuOnly
        );
        assert_eq!(
            BufferUsage::Uniform.memory_location(),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            BufferUsage::Staging.memory_location(),
            MemoryLocation::CpuToGpu
        );
    }

    #[test]
    fn test_write_bounds() {
        assert!(check_write_bounds(0, 64, 64).is_ok());
        assert!(check_write_bounds(32, 32, 64).is_ok());
        assert!(check_write_bounds(0, 65, 64).is_err());
        assert!(check_write_bounds(33, 32, 64).is_err());
    }

    #[test]
    fn test_usage_names() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Staging.name(), "staging");
    }
}
