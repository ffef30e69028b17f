//! Vulkan instance, validation layer, and debug messenger setup.
//!
//! [`Instance`] owns the entry loader, the VkInstance, and the optional
//! debug messenger. Surface extensions are platform-specific, so the
//! windowing layer enumerates them and passes the list in; this module
//! never guesses per platform.

use std::ffi::{CStr, c_char};

use ash::{Entry, vk};
use tracing::{error, info, warn};

use crate::error::RhiError;

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// The Vulkan instance and everything scoped to it.
///
/// Dropping the instance tears the debug messenger down first, then the
/// VkInstance itself.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl Instance {
    /// Creates the instance.
    ///
    /// `surface_extensions` is the list from
    /// `ash_window::enumerate_required_extensions`. With
    /// `enable_validation` the Khronos validation layer and a debug
    /// messenger are enabled on top.
    ///
    /// # Errors
    ///
    /// Fails if the Vulkan library cannot be loaded, if validation was
    /// requested but the layer is not installed
    /// ([`RhiError::MissingValidationLayer`]), if any requested extension
    /// is unsupported ([`RhiError::MissingInstanceExtension`]), or if
    /// instance or messenger creation fails.
    pub fn new(
        surface_extensions: &[*const c_char],
        enable_validation: bool,
    ) -> Result<Self, RhiError> {
        let entry = unsafe { Entry::load()? };

        // Requested validation must actually be present; running
        // "validated" without the layer checks nothing.
        if enable_validation && !validation_layer_available(&entry)? {
            return Err(RhiError::MissingValidationLayer(
                VALIDATION_LAYER_NAME.to_string_lossy().into_owned(),
            ));
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"prism")
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions = surface_extensions.to_vec();
        if enable_validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        check_extension_support(&entry, &extensions)?;

        let layers: Vec<*const c_char> = if enable_validation {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(RhiError::from)?
        };

        info!("Vulkan instance created successfully");

        let (debug_utils, debug_messenger) = if enable_validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = create_debug_messenger(&loader)?;
            info!("Validation layers enabled, debug messenger created");
            (Some(loader), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// True when the debug messenger is active.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            // Messenger first, it belongs to the instance
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

fn validation_layer_available(entry: &Entry) -> Result<bool, RhiError> {
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };

    Ok(layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER_NAME
    }))
}

// Fails with the name of the first unsupported extension.
fn check_extension_support(entry: &Entry, requested: &[*const c_char]) -> Result<(), RhiError> {
    let available = unsafe { entry.enumerate_instance_extension_properties(None)? };

    for &ext in requested {
        let name = unsafe { CStr::from_ptr(ext) };
        let supported = available.iter().any(|props| {
            let available_name = unsafe { CStr::from_ptr(props.extension_name.as_ptr()) };
            available_name == name
        });
        if !supported {
            return Err(RhiError::MissingInstanceExtension(
                name.to_string_lossy().into_owned(),
            ));
        }
    }

    Ok(())
}

fn create_debug_messenger(
    loader: &ash::ext::debug_utils::Instance,
) -> Result<vk::DebugUtilsMessengerEXT, RhiError> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe {
        loader
            .create_debug_utils_messenger(&create_info, None)
            .map_err(RhiError::from)
    }
}

/// Routes validation layer messages into `tracing`.
///
/// # Safety
///
/// Called by the driver; must follow the Vulkan debug callback contract.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let type_str = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            error!("[Vulkan {}] {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            warn!("[Vulkan {}] {}", type_str, message);
        }
        _ => {
            info!("[Vulkan {}] {}", type_str, message);
        }
    }

    // VK_FALSE: never abort the triggering call
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both tests tolerate machines without a Vulkan driver or SDK.

    #[test]
    fn test_instance_without_validation() {
        match Instance::new(&[], false) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(RhiError::LoadingError(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_instance_with_validation() {
        match Instance::new(&[], true) {
            Ok(instance) => assert!(instance.has_validation()),
            Err(RhiError::LoadingError(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(RhiError::MissingValidationLayer(name)) => {
                assert_eq!(name, "VK_LAYER_KHRONOS_validation");
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }
}
