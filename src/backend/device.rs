// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Physical device selection (first GPU meeting every requirement)
// - Logical device + graphics/present queue creation
// - Swapchain and image view ownership
//
// `VulkanDevice` is the ash-backed `GpuDevice`; `DeviceContext` owns one and
// tears down image views, swapchain and device in that order.

use ash::prelude::VkResult;
use ash::vk;
use std::ffi::{CStr, CString};

use super::error::{Error, Result};
use super::gpu::{DeviceRequest, FramePresent, FrameSubmit, GpuDevice, InstanceApi};
use super::handle::Owned;
use super::instance::VALIDATION_LAYER;
use super::swapchain::{image_view_info, SurfaceSupport, SwapchainPlan, SwapchainState};

/// Queue family per capability role, unresolved roles are `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Takes the first graphics family and the first family that can present
    /// to the surface, stopping once both roles are filled.
    pub fn resolve<F>(
        families: &[vk::QueueFamilyProperties],
        mut present_support: F,
    ) -> VkResult<Self>
    where
        F: FnMut(u32) -> VkResult<bool>,
    {
        let mut indices = Self::default();

        for (index, family) in (0u32..).zip(families) {
            if indices.graphics.is_none()
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics = Some(index);
            }
            if indices.present.is_none() && present_support(index)? {
                indices.present = Some(index);
            }
            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn resolved(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Fully resolved queue families; the roles may share one index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices, ascending
    pub fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics, self.present];
        families.sort_unstable();
        families.dedup();
        families
    }
}

/// Everything selection needs to know about one GPU
#[derive(Debug, Clone)]
pub struct PhysicalDeviceCandidate {
    pub queue_families: QueueFamilyIndices,
    pub extensions_supported: bool,
    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl PhysicalDeviceCandidate {
    pub fn is_suitable(&self) -> bool {
        self.queue_families.is_complete()
            && self.extensions_supported
            && !self.surface_formats.is_empty()
            && !self.present_modes.is_empty()
    }
}

/// Extensions and layers the logical device is created with
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub extensions: Vec<&'static CStr>,
    pub layers: Vec<&'static CStr>,
}

impl DeviceConfig {
    pub fn new(enable_validation: bool) -> Self {
        Self {
            extensions: vec![ash::khr::swapchain::NAME],
            layers: if enable_validation {
                vec![VALIDATION_LAYER]
            } else {
                Vec::new()
            },
        }
    }
}

/// The GPU chosen by `select_physical_device`
#[derive(Debug, Clone, Copy)]
pub struct PhysicalDeviceSelection {
    pub physical_device: vk::PhysicalDevice,
    pub queue_families: QueueFamilies,
}

pub fn supports_extensions(available: &[CString], required: &[&CStr]) -> bool {
    required
        .iter()
        .all(|name| available.iter().any(|ext| ext.as_c_str() == *name))
}

/// Gather the capability record of one GPU
pub fn probe_candidate<I: InstanceApi + ?Sized>(
    api: &I,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    required_extensions: &[&CStr],
) -> VkResult<PhysicalDeviceCandidate> {
    let families = api.queue_families(physical_device);
    let queue_families = QueueFamilyIndices::resolve(&families, |index| {
        api.present_support(physical_device, index, surface)
    })?;

    let available = api.device_extensions(physical_device)?;
    let extensions_supported = supports_extensions(&available, required_extensions);

    // Surface queries need the swapchain extension to mean anything
    let support = if extensions_supported {
        api.surface_support(physical_device, surface)?
    } else {
        SurfaceSupport::default()
    };

    Ok(PhysicalDeviceCandidate {
        queue_families,
        extensions_supported,
        surface_formats: support.formats,
        present_modes: support.present_modes,
    })
}

/// First suitable GPU in enumeration order
pub fn select_physical_device<I: InstanceApi + ?Sized>(
    api: &I,
    surface: vk::SurfaceKHR,
    config: &DeviceConfig,
) -> Result<PhysicalDeviceSelection> {
    let devices = api
        .physical_devices()
        .map_err(|e| Error::NoSuitableDevice(format!("failed to enumerate GPUs: {e}")))?;

    if devices.is_empty() {
        return Err(Error::NoSuitableDevice("no Vulkan-capable GPU found".into()));
    }

    for &physical_device in &devices {
        let label = api.device_label(physical_device);

        match probe_candidate(api, physical_device, surface, &config.extensions) {
            Ok(candidate) if candidate.is_suitable() => {
                if let Some(queue_families) = candidate.queue_families.resolved() {
                    log::info!("Selected GPU: {}", label);
                    log::info!(
                        "Queue families: graphics {}, present {}",
                        queue_families.graphics,
                        queue_families.present
                    );
                    return Ok(PhysicalDeviceSelection {
                        physical_device,
                        queue_families,
                    });
                }
            }
            Ok(candidate) => log::debug!("Skipping GPU {}: {:?}", label, candidate),
            Err(e) => log::warn!("Failed to query GPU {}: {}", label, e),
        }
    }

    Err(Error::NoSuitableDevice(format!(
        "none of the {} GPUs supports graphics, presentation and the swapchain",
        devices.len()
    )))
}

/// Logical device, its queues and the swapchain built on it
pub struct DeviceContext<D: GpuDevice> {
    device: D,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain: Option<SwapchainState>,
}

impl<D: GpuDevice> DeviceContext<D> {
    /// Select a GPU, create the device, the swapchain and its image views
    pub fn new<I>(
        api: &I,
        surface: vk::SurfaceKHR,
        framebuffer: vk::Extent2D,
        config: &DeviceConfig,
    ) -> Result<Self>
    where
        I: InstanceApi<Device = D> + ?Sized,
    {
        let selection = select_physical_device(api, surface, config)?;
        let mut context = Self::create_logical_device(api, &selection, config)?;
        context.create_swapchain(api, surface, framebuffer)?;
        context.create_image_views()?;
        Ok(context)
    }

    /// One queue per distinct family at priority 1.0
    pub fn create_logical_device<I>(
        api: &I,
        selection: &PhysicalDeviceSelection,
        config: &DeviceConfig,
    ) -> Result<Self>
    where
        I: InstanceApi<Device = D> + ?Sized,
    {
        let families = selection.queue_families.unique();
        let request = DeviceRequest {
            queue_families: &families,
            extensions: &config.extensions,
            layers: &config.layers,
        };

        let device = api
            .create_device(selection.physical_device, &request)
            .map_err(Error::DeviceCreation)?;

        let graphics_queue = device.queue(selection.queue_families.graphics);
        let present_queue = device.queue(selection.queue_families.present);

        log::info!("Created logical device with {} queue(s)", families.len());

        Ok(Self {
            device,
            physical_device: selection.physical_device,
            queue_families: selection.queue_families,
            graphics_queue,
            present_queue,
            swapchain: None,
        })
    }

    /// Build the swapchain from a fresh capability query
    pub fn create_swapchain<I: InstanceApi + ?Sized>(
        &mut self,
        api: &I,
        surface: vk::SurfaceKHR,
        framebuffer: vk::Extent2D,
    ) -> Result<()> {
        // The surface can only have one swapchain at a time
        if let Some(old) = self.swapchain.take() {
            old.destroy(&self.device);
        }

        let support = api
            .surface_support(self.physical_device, surface)
            .map_err(Error::swapchain("query surface support"))?;

        let plan = SwapchainPlan::new(&support, self.queue_families, framebuffer).ok_or(
            Error::Swapchain {
                stage: "choose a surface format",
                result: vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
            },
        )?;

        log::info!("Present mode: {:?}", plan.present_mode);

        let handle = self
            .device
            .create_swapchain(&plan.create_info(surface))
            .map_err(Error::swapchain("create swapchain"))?;
        let handle = Owned::new(&self.device, handle);

        // The driver may hand out more images than requested
        let images = self
            .device
            .swapchain_images(handle.raw())
            .map_err(Error::swapchain("get swapchain images"))?;

        log::info!(
            "Created swapchain with {} images: {}x{} {:?}",
            images.len(),
            plan.extent.width,
            plan.extent.height,
            plan.surface_format.format
        );

        self.swapchain = Some(SwapchainState {
            handle: handle.into_raw(),
            surface_format: plan.surface_format,
            present_mode: plan.present_mode,
            extent: plan.extent,
            images,
            image_views: Vec::new(),
        });

        Ok(())
    }

    /// One view per swapchain image; earlier views are released on failure
    pub fn create_image_views(&mut self) -> Result<()> {
        let device = &self.device;
        let state = self.swapchain.as_mut().ok_or(Error::SwapchainMissing)?;

        for view in state.image_views.drain(..) {
            device.destroy_image_view(view);
        }

        let format = state.format();
        let views = state
            .images
            .iter()
            .enumerate()
            .map(|(index, &image)| {
                device
                    .create_image_view(&image_view_info(image, format))
                    .map(|view| Owned::new(device, view))
                    .map_err(|result| Error::ImageView { index, result })
            })
            .collect::<Result<Vec<_>>>()?;

        state.image_views = views.into_iter().map(Owned::into_raw).collect();
        Ok(())
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn swapchain(&self) -> Result<&SwapchainState> {
        self.swapchain.as_ref().ok_or(Error::SwapchainMissing)
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        self.device
            .wait_idle()
            .map_err(Error::render("wait for the device to go idle"))
    }
}

impl<D: GpuDevice> Drop for DeviceContext<D> {
    fn drop(&mut self) {
        log::debug!("Destroying device context...");

        let _ = self.device.wait_idle();

        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(&self.device);
        }
        self.device.destroy_device();
    }
}

/// ash-backed device dispatch
pub struct VulkanDevice {
    pub device: ash::Device,
    pub swapchain_loader: ash::khr::swapchain::Device,
}

impl VulkanDevice {
    pub fn new(instance: &ash::Instance, device: ash::Device) -> Self {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance, &device);
        Self {
            device,
            swapchain_loader,
        }
    }
}

impl GpuDevice for VulkanDevice {
    fn queue(&self, queue_family: u32) -> vk::Queue {
        unsafe { self.device.get_device_queue(queue_family, 0) }
    }

    fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }

    fn destroy_device(&self) {
        unsafe { self.device.destroy_device(None) }
    }

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain_loader.create_swapchain(info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        unsafe { self.device.create_image_view(info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        unsafe { self.device.create_shader_module(&create_info, None) }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.device.destroy_shader_module(module, None) }
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo<'_>) -> VkResult<vk::RenderPass> {
        unsafe { self.device.create_render_pass(info, None) }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) }
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        unsafe { self.device.create_pipeline_layout(info, None) }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) }
    }

    fn create_graphics_pipeline(
        &self,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        let pipelines = unsafe {
            self.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(info),
                None,
            )
        }
        .map_err(|(_, e)| e)?;

        pipelines.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) }
    }

    fn create_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        unsafe { self.device.create_framebuffer(info, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) }
    }

    fn create_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        unsafe { self.device.create_command_pool(info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.allocate_command_buffers(&alloc_info) }?;
        buffers.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        unsafe { self.device.create_semaphore(&semaphore_info, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence_info = vk::FenceCreateInfo::default().flags(flags);
        unsafe { self.device.create_fence(&fence_info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, timeout) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout, signal, vk::Fence::null())
        }
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
        }
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe { self.device.begin_command_buffer(command_buffer, &begin_info) }
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
    ) {
        unsafe {
            self.device
                .cmd_begin_render_pass(command_buffer, info, vk::SubpassContents::INLINE)
        }
    }

    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline)
        }
    }

    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: &vk::Viewport) {
        unsafe {
            self.device
                .cmd_set_viewport(command_buffer, 0, std::slice::from_ref(viewport))
        }
    }

    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: &vk::Rect2D) {
        unsafe {
            self.device
                .cmd_set_scissor(command_buffer, 0, std::slice::from_ref(scissor))
        }
    }

    fn cmd_draw(&self, command_buffer: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .cmd_draw(command_buffer, vertex_count, instance_count, 0, 0)
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(command_buffer) }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(command_buffer) }
    }

    fn queue_submit(&self, queue: vk::Queue, submit: &FrameSubmit) -> VkResult<()> {
        let wait_semaphores = [submit.wait_semaphore];
        let wait_stages = [submit.wait_stage];
        let command_buffers = [submit.command_buffer];
        let signal_semaphores = [submit.signal_semaphore];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .queue_submit(queue, std::slice::from_ref(&submit_info), submit.fence)
        }
    }

    fn queue_present(&self, queue: vk::Queue, present: &FramePresent) -> VkResult<bool> {
        let wait_semaphores = [present.wait_semaphore];
        let swapchains = [present.swapchain];
        let image_indices = [present.image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }
}
