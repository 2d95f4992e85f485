// Vulkan Instance - Loader, instance and presentation surface
//
// Responsibilities:
// - Loading the Vulkan library
// - Validation layer availability check
// - Instance creation with the window-system extensions
// - Surface creation for the window
// - Instance-level GPU queries used during device selection

use ash::prelude::VkResult;
use ash::vk;
use ash::Entry;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::ffi::{CStr, CString};

use super::device::VulkanDevice;
use super::error::{InitError, Result};
use super::gpu::{DeviceRequest, InstanceApi, InstanceOwner};
use super::swapchain::SurfaceSupport;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

const ENGINE_NAME: &CStr = c"UranEngine";

#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub application_name: CString,
    pub validation_layers: Vec<&'static CStr>,
}

impl InstanceConfig {
    pub fn new(application_name: &CStr, enable_validation: bool) -> Self {
        Self {
            application_name: application_name.to_owned(),
            validation_layers: if enable_validation {
                vec![VALIDATION_LAYER]
            } else {
                Vec::new()
            },
        }
    }
}

/// First requested layer the loader does not know about
pub fn missing_layer<'a>(available: &[CString], requested: &[&'a CStr]) -> Option<&'a CStr> {
    requested
        .iter()
        .copied()
        .find(|name| !available.iter().any(|layer| layer.as_c_str() == *name))
}

/// The loaded library and instance, plus the surface extension loader
///
/// Owned by an `InstanceContext`, which decides when the instance dies.
pub struct VulkanInstance {
    // Must be kept alive while `instance` exists
    entry: Entry,
    instance: ash::Instance,
    surface_loader: ash::khr::surface::Instance,
}

impl VulkanInstance {
    /// Load Vulkan and create an instance able to present to `display`
    pub fn new(display: &impl HasDisplayHandle, config: &InstanceConfig) -> Result<Self> {
        let entry = unsafe { Entry::load() }.map_err(InitError::from)?;

        if !config.validation_layers.is_empty() {
            let available = Self::available_layers(&entry)?;
            if let Some(layer) = missing_layer(&available, &config.validation_layers) {
                let name = layer.to_string_lossy().into_owned();
                return Err(InitError::ValidationUnavailable(name).into());
            }
            log::info!("Validation layers enabled");
        }

        let display_handle = display.display_handle().map_err(InitError::from)?.as_raw();
        let extensions = ash_window::enumerate_required_extensions(display_handle)
            .map_err(InitError::vulkan("query window-system extensions"))?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&config.application_name)
            .application_version(vk::make_api_version(0, 0, 0, 1))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 0, 0, 1))
            .api_version(vk::API_VERSION_1_0);

        let layer_names: Vec<_> = config
            .validation_layers
            .iter()
            .map(|layer| layer.as_ptr())
            .collect();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(InitError::vulkan("create instance"))?;

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        log::info!(
            "Vulkan instance created for {:?}",
            config.application_name
        );

        Ok(Self {
            entry,
            instance,
            surface_loader,
        })
    }

    fn available_layers(entry: &Entry) -> Result<Vec<CString>> {
        let layers = unsafe { entry.enumerate_instance_layer_properties() }
            .map_err(InitError::vulkan("enumerate instance layers"))?;

        Ok(layers
            .iter()
            .filter_map(|layer| layer.layer_name_as_c_str().ok())
            .map(CStr::to_owned)
            .collect())
    }
}

impl InstanceOwner for VulkanInstance {
    fn create_surface(
        &self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        unsafe { ash_window::create_surface(&self.entry, &self.instance, display, window, None) }
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        unsafe { self.surface_loader.destroy_surface(surface, None) };
    }

    fn destroy_instance(&self) {
        unsafe { self.instance.destroy_instance(None) };
    }
}

/// Instance plus the one presentation surface bound to it
///
/// Dropping it destroys the surface first, then the instance.
pub struct InstanceContext<I: InstanceOwner = VulkanInstance> {
    api: I,
    surface: Option<vk::SurfaceKHR>,
}

impl InstanceContext {
    pub fn new(display: &impl HasDisplayHandle, config: &InstanceConfig) -> Result<Self> {
        Ok(Self::from_api(VulkanInstance::new(display, config)?))
    }
}

impl<I: InstanceOwner> InstanceContext<I> {
    /// Take ownership of an already created instance
    pub fn from_api(api: I) -> Self {
        Self { api, surface: None }
    }

    /// Bind the presentation surface; there is at most one per instance
    pub fn create_surface<W>(&mut self, window: &W) -> Result<vk::SurfaceKHR>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        if self.surface.is_some() {
            return Err(InitError::SurfaceExists.into());
        }

        let display_handle = window.display_handle().map_err(InitError::from)?.as_raw();
        let window_handle = window.window_handle().map_err(InitError::from)?.as_raw();

        let surface = self
            .api
            .create_surface(display_handle, window_handle)
            .map_err(InitError::vulkan("create window surface"))?;

        log::info!("Window surface created");
        self.surface = Some(surface);
        Ok(surface)
    }

    /// Instance queries for GPU selection and device creation
    pub fn api(&self) -> &I {
        &self.api
    }
}

impl InstanceApi for VulkanInstance {
    type Device = VulkanDevice;

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }
    }

    fn device_label(&self, physical_device: vk::PhysicalDevice) -> String {
        let props = unsafe { self.instance.get_physical_device_properties(physical_device) };
        let name = props
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| String::from("<unnamed>"));

        format!(
            "{} (Vulkan {}.{}.{})",
            name,
            vk::api_version_major(props.api_version),
            vk::api_version_minor(props.api_version),
            vk::api_version_patch(props.api_version)
        )
    }

    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(physical_device)
        }
    }

    fn present_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, queue_family, surface)
        }
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        let extensions = unsafe {
            self.instance
                .enumerate_device_extension_properties(physical_device)
        }?;

        Ok(extensions
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(CStr::to_owned)
            .collect())
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<SurfaceSupport> {
        unsafe {
            Ok(SurfaceSupport {
                capabilities: self
                    .surface_loader
                    .get_physical_device_surface_capabilities(physical_device, surface)?,
                formats: self
                    .surface_loader
                    .get_physical_device_surface_formats(physical_device, surface)?,
                present_modes: self
                    .surface_loader
                    .get_physical_device_surface_present_modes(physical_device, surface)?,
            })
        }
    }

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        request: &DeviceRequest<'_>,
    ) -> VkResult<VulkanDevice> {
        let queue_priorities = [1.0f32];
        let queue_infos: Vec<_> = request
            .queue_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let extension_names: Vec<_> =
            request.extensions.iter().map(|ext| ext.as_ptr()).collect();
        let layer_names: Vec<_> = request.layers.iter().map(|layer| layer.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default();

        // Device layers are ignored by current loaders but older ones still read them
        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .enabled_features(&features);

        let device = unsafe {
            self.instance
                .create_device(physical_device, &create_info, None)
        }?;

        Ok(VulkanDevice::new(&self.instance, device))
    }
}

impl<I: InstanceOwner> Drop for InstanceContext<I> {
    fn drop(&mut self) {
        log::debug!("Destroying Vulkan instance...");

        if let Some(surface) = self.surface.take() {
            self.api.destroy_surface(surface);
        }
        self.api.destroy_instance();
    }
}
