//! Physical device enumeration and selection.
//!
//! A candidate GPU must offer a graphics queue family, a queue family able
//! to present to the target surface, the swapchain device extension, and a
//! surface with at least one format and one present mode. Among the
//! candidates the highest-scoring one wins, with discrete GPUs strongly
//! preferred over integrated ones.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Device extensions every candidate GPU must support.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Discovered queue family indices.
///
/// Graphics and present support usually share a family, but they are
/// looked up independently and may differ.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    /// Family with `QueueFlags::GRAPHICS`.
    pub graphics_family: Option<u32>,
    /// Family that can present to the target surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// True once both required families are found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the found family indices with duplicates removed.
    ///
    /// Logical device creation must not request two queues from the same
    /// family, so a shared graphics/present family appears once.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// Everything the logical device needs to know about the selected GPU.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Returns the device type.
    pub fn device_type(&self) -> vk::PhysicalDeviceType {
        self.properties.device_type
    }

    /// Returns the device type as a display string.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the supported Vulkan version as (major, minor, patch).
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Sums the DEVICE_LOCAL heap sizes in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Picks the best GPU that can render to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no device meets the
/// requirements, and propagates enumeration failures.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let best = devices
        .into_iter()
        .filter_map(|device| {
            let info = check_device_suitability(instance, device, surface, surface_loader)?;
            let score = rate_device(&info);
            debug!(
                "GPU '{}' ({}), score {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            Some((info, score))
        })
        .max_by_key(|(_, score)| *score);

    let Some((selected, score)) = best else {
        warn!("No GPU meets the queue, extension, and surface requirements");
        return Err(RhiError::NoSuitableGpu);
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}), Vulkan {}.{}.{}, score {}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        score
    );

    Ok(selected)
}

// Returns None when the device fails any hard requirement.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let device_name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("Unknown")
    };

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: queue families incomplete (graphics={}, present={})",
            device_name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return None;
    }

    if let Err(missing) = check_extension_support(instance, device) {
        debug!("GPU '{}' skipped: missing extension {}", device_name, missing);
        return None;
    }

    // Without a format and a present mode no swapchain can be created
    if !surface_is_adequate(device, surface, surface_loader) {
        debug!("GPU '{}' skipped: surface not adequate", device_name);
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families,
    })
}

// Err carries the name of the first missing extension.
fn check_extension_support(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> Result<(), String> {
    let available = unsafe {
        instance
            .enumerate_device_extension_properties(device)
            .unwrap_or_default()
    };

    for required in REQUIRED_DEVICE_EXTENSIONS {
        let found = available.iter().any(|props| {
            let name = unsafe { CStr::from_ptr(props.extension_name.as_ptr()) };
            name == *required
        });
        if !found {
            return Err(required.to_string_lossy().into_owned());
        }
    }

    Ok(())
}

fn surface_is_adequate(
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> bool {
    let formats = unsafe {
        surface_loader
            .get_physical_device_surface_formats(device, surface)
            .unwrap_or_default()
    };
    let present_modes = unsafe {
        surface_loader
            .get_physical_device_surface_present_modes(device, surface)
            .unwrap_or_default()
    };

    !formats.is_empty() && !present_modes.is_empty()
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;

        if family.queue_count == 0 {
            continue;
        }

        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            && indices.graphics_family.is_none()
        {
            indices.graphics_family = Some(i);
        }

        if indices.present_family.is_none() {
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i, surface)
                    .unwrap_or(false)
            };
            if present_support {
                indices.present_family = Some(i);
            }
        }

        if indices.is_complete() {
            break;
        }
    }

    indices
}

// Higher is better. Device type dominates; image dimension limit and VRAM
// break ties between devices of the same type.
fn rate_device(info: &PhysicalDeviceInfo) -> u32 {
    let mut score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };

    score += info.properties.limits.max_image_dimension2_d;

    let vram_mb = (info.device_local_memory() / (1024 * 1024)) as u32;
    score += vram_mb.min(16000);

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_default_incomplete() {
        let indices = QueueFamilyIndices::default();
        assert!(indices.graphics_family.is_none());
        assert!(indices.present_family.is_none());
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_indices_complete_needs_both() {
        let both = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(both.is_complete());

        let graphics_only = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!graphics_only.is_complete());

        let present_only = QueueFamilyIndices {
            graphics_family: None,
            present_family: Some(0),
        };
        assert!(!present_only.is_complete());
    }

    #[test]
    fn test_unique_families_distinct() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
        };
        let unique = indices.unique_families();
        assert_eq!(unique, vec![0, 1]);
    }

    #[test]
    fn test_unique_families_deduplicates_shared() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn test_required_extensions_include_swapchain() {
        assert!(REQUIRED_DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }
}
