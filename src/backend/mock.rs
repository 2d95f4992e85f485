// Recording stand-ins for the instance and device seams
//
// `MockDevice` hands out unique fake handles, logs every call and panics on a
// double destroy. `MockInstance` serves a configurable list of GPUs and logs
// its surface and instance lifetimes into the same device record.

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::ffi::{CStr, CString};
use std::rc::Rc;

use super::gpu::{
    DeviceRequest, FramePresent, FrameSubmit, GpuDevice, InstanceApi, InstanceOwner,
};
use super::swapchain::SurfaceSupport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(&'static str, u64),
    Destroy(&'static str, u64),
    WaitIdle,
    WaitFence(u64),
    ResetFence(u64),
    Acquire { signal: u64, index: u32 },
    ResetCommandBuffer(u64),
    BeginCommandBuffer(u64),
    BeginRenderPass { framebuffer: u64, width: u32, height: u32 },
    BindPipeline(u64),
    SetViewport { width: u32, height: u32 },
    SetScissor { width: u32, height: u32 },
    Draw { vertices: u32, instances: u32 },
    EndRenderPass,
    EndCommandBuffer(u64),
    Submit(FrameSubmit),
    Present(FramePresent),
}

/// What a swapchain was created with
#[derive(Debug, Clone)]
pub struct SwapchainRecord {
    pub min_image_count: u32,
    pub format: vk::Format,
    pub present_mode: vk::PresentModeKHR,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub extent: (u32, u32),
}

struct State {
    next_handle: u64,
    calls: Vec<Call>,
    live: HashSet<u64>,
    device_destroyed: bool,
    image_count: u32,
    acquired: u32,
    acquire_script: VecDeque<u32>,
    fail_create: Option<(&'static str, usize)>,
    fail_frame: Option<&'static str>,
    acquire_suboptimal: bool,
    present_suboptimal: bool,
    signaled_fences: Vec<u64>,
    framebuffer_views: Vec<(u64, u64)>,
    swapchains: Vec<SwapchainRecord>,
}

#[derive(Clone)]
pub struct MockDevice {
    state: Rc<RefCell<State>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_image_count(2)
    }

    pub fn with_image_count(image_count: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                next_handle: 0x100,
                calls: Vec::new(),
                live: HashSet::new(),
                device_destroyed: false,
                image_count,
                acquired: 0,
                acquire_script: VecDeque::new(),
                fail_create: None,
                fail_frame: None,
                acquire_suboptimal: false,
                present_suboptimal: false,
                signaled_fences: Vec::new(),
                framebuffer_views: Vec::new(),
                swapchains: Vec::new(),
            })),
        }
    }

    /// Image indices returned by the next acquires, cycling afterwards
    pub fn script_acquires(&self, indices: &[u32]) {
        self.state.borrow_mut().acquire_script.extend(indices);
    }

    /// Let `succeed` creations of `kind` through, then fail the next one
    pub fn fail_create(&self, kind: &'static str, succeed: usize) {
        self.state.borrow_mut().fail_create = Some((kind, succeed));
    }

    /// Fail every call of one frame operation with `ERROR_DEVICE_LOST`
    pub fn fail_frame(&self, op: &'static str) {
        self.state.borrow_mut().fail_frame = Some(op);
    }

    pub fn acquire_suboptimal(&self) {
        self.state.borrow_mut().acquire_suboptimal = true;
    }

    pub fn present_suboptimal(&self) {
        self.state.borrow_mut().present_suboptimal = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Handles created of one kind, in creation order
    pub fn created(&self, kind: &str) -> Vec<u64> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Create(k, raw) if *k == kind => Some(*raw),
                _ => None,
            })
            .collect()
    }

    pub fn created_kinds(&self) -> Vec<&'static str> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Create(kind, _) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    pub fn destroy_calls(&self) -> Vec<(&'static str, u64)> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Destroy(kind, raw) => Some((*kind, *raw)),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed_kinds(&self) -> Vec<&'static str> {
        self.destroy_calls().into_iter().map(|(kind, _)| kind).collect()
    }

    /// Objects created and not yet destroyed, the device included
    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn signaled_fences(&self) -> Vec<u64> {
        self.state.borrow().signaled_fences.clone()
    }

    /// (framebuffer, first attachment) pairs
    pub fn framebuffer_views(&self) -> Vec<(u64, u64)> {
        self.state.borrow().framebuffer_views.clone()
    }

    pub fn swapchains(&self) -> Vec<SwapchainRecord> {
        self.state.borrow().swapchains.clone()
    }

    fn create(&self, kind: &'static str) -> VkResult<u64> {
        let mut state = self.state.borrow_mut();

        if let Some((fail_kind, remaining)) = state.fail_create {
            if fail_kind == kind {
                if remaining == 0 {
                    state.fail_create = None;
                    return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
                }
                state.fail_create = Some((fail_kind, remaining - 1));
            }
        }

        state.next_handle += 1;
        let raw = state.next_handle;
        state.live.insert(raw);
        state.calls.push(Call::Create(kind, raw));
        Ok(raw)
    }

    fn destroy(&self, kind: &'static str, raw: u64) {
        let mut state = self.state.borrow_mut();
        assert!(
            state.live.remove(&raw),
            "{kind} {raw:#x} destroyed twice or never created"
        );
        state.calls.push(Call::Destroy(kind, raw));
    }

    fn frame_op(&self, op: &'static str) -> VkResult<()> {
        if self.state.borrow().fail_frame == Some(op) {
            Err(vk::Result::ERROR_DEVICE_LOST)
        } else {
            Ok(())
        }
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }

    /// Marks the device itself as live; `MockInstance` calls this on creation
    fn open(&self) {
        let mut state = self.state.borrow_mut();
        state.device_destroyed = false;
        state.live.insert(0);
    }
}

impl GpuDevice for MockDevice {
    fn queue(&self, queue_family: u32) -> vk::Queue {
        vk::Queue::from_raw(0x1000 + u64::from(queue_family))
    }

    fn wait_idle(&self) -> VkResult<()> {
        self.record(Call::WaitIdle);
        Ok(())
    }

    fn destroy_device(&self) {
        assert!(
            !self.state.borrow().device_destroyed,
            "device destroyed twice"
        );
        self.state.borrow_mut().device_destroyed = true;
        self.destroy("device", 0);
    }

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        let queue_family_indices = if info.queue_family_index_count == 0 {
            Vec::new()
        } else {
            unsafe {
                std::slice::from_raw_parts(
                    info.p_queue_family_indices,
                    info.queue_family_index_count as usize,
                )
            }
            .to_vec()
        };

        self.state.borrow_mut().swapchains.push(SwapchainRecord {
            min_image_count: info.min_image_count,
            format: info.image_format,
            present_mode: info.present_mode,
            sharing_mode: info.image_sharing_mode,
            queue_family_indices,
            extent: (info.image_extent.width, info.image_extent.height),
        });

        self.create("swapchain").map(vk::SwapchainKHR::from_raw)
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let count = self.state.borrow().image_count;
        Ok((0..count)
            .map(|i| vk::Image::from_raw(0x10_0000 + u64::from(i)))
            .collect())
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.destroy("swapchain", swapchain.as_raw());
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        self.create("image_view").map(vk::ImageView::from_raw)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.destroy("image_view", view.as_raw());
    }

    fn create_shader_module(&self, _code: &[u32]) -> VkResult<vk::ShaderModule> {
        self.create("shader_module").map(vk::ShaderModule::from_raw)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.destroy("shader_module", module.as_raw());
    }

    fn create_render_pass(&self, _info: &vk::RenderPassCreateInfo<'_>) -> VkResult<vk::RenderPass> {
        self.create("render_pass").map(vk::RenderPass::from_raw)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.destroy("render_pass", render_pass.as_raw());
    }

    fn create_pipeline_layout(
        &self,
        _info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        self.create("pipeline_layout").map(vk::PipelineLayout::from_raw)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.destroy("pipeline_layout", layout.as_raw());
    }

    fn create_graphics_pipeline(
        &self,
        _info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        self.create("pipeline").map(vk::Pipeline::from_raw)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.destroy("pipeline", pipeline.as_raw());
    }

    fn create_framebuffer(
        &self,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        let framebuffer = self.create("framebuffer")?;
        if info.attachment_count > 0 {
            let view = unsafe { *info.p_attachments };
            self.state
                .borrow_mut()
                .framebuffer_views
                .push((framebuffer, view.as_raw()));
        }
        Ok(vk::Framebuffer::from_raw(framebuffer))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.destroy("framebuffer", framebuffer.as_raw());
    }

    fn create_command_pool(
        &self,
        _info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        self.create("command_pool").map(vk::CommandPool::from_raw)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.destroy("command_pool", pool.as_raw());
    }

    fn allocate_command_buffer(&self, _pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        let raw = self.create("command_buffer")?;
        // freed with the pool, never destroyed on its own
        self.state.borrow_mut().live.remove(&raw);
        Ok(vk::CommandBuffer::from_raw(raw))
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        self.create("semaphore").map(vk::Semaphore::from_raw)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.destroy("semaphore", semaphore.as_raw());
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let raw = self.create("fence")?;
        if signaled {
            self.state.borrow_mut().signaled_fences.push(raw);
        }
        Ok(vk::Fence::from_raw(raw))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.destroy("fence", fence.as_raw());
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VkResult<()> {
        self.frame_op("wait_fence")?;
        self.record(Call::WaitFence(fence.as_raw()));
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.frame_op("reset_fence")?;
        self.record(Call::ResetFence(fence.as_raw()));
        Ok(())
    }

    fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        _timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.frame_op("acquire")?;

        let (index, suboptimal) = {
            let mut state = self.state.borrow_mut();
            let index = match state.acquire_script.pop_front() {
                Some(index) => index,
                None => state.acquired % state.image_count.max(1),
            };
            state.acquired += 1;
            (index, state.acquire_suboptimal)
        };

        self.record(Call::Acquire {
            signal: signal.as_raw(),
            index,
        });
        Ok((index, suboptimal))
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.frame_op("reset_command_buffer")?;
        self.record(Call::ResetCommandBuffer(command_buffer.as_raw()));
        Ok(())
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.frame_op("begin_command_buffer")?;
        self.record(Call::BeginCommandBuffer(command_buffer.as_raw()));
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        _command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
    ) {
        self.record(Call::BeginRenderPass {
            framebuffer: info.framebuffer.as_raw(),
            width: info.render_area.extent.width,
            height: info.render_area.extent.height,
        });
    }

    fn cmd_bind_pipeline(&self, _command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record(Call::BindPipeline(pipeline.as_raw()));
    }

    fn cmd_set_viewport(&self, _command_buffer: vk::CommandBuffer, viewport: &vk::Viewport) {
        self.record(Call::SetViewport {
            width: viewport.width as u32,
            height: viewport.height as u32,
        });
    }

    fn cmd_set_scissor(&self, _command_buffer: vk::CommandBuffer, scissor: &vk::Rect2D) {
        self.record(Call::SetScissor {
            width: scissor.extent.width,
            height: scissor.extent.height,
        });
    }

    fn cmd_draw(&self, _command_buffer: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        self.record(Call::Draw {
            vertices: vertex_count,
            instances: instance_count,
        });
    }

    fn cmd_end_render_pass(&self, _command_buffer: vk::CommandBuffer) {
        self.record(Call::EndRenderPass);
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.frame_op("end_command_buffer")?;
        self.record(Call::EndCommandBuffer(command_buffer.as_raw()));
        Ok(())
    }

    fn queue_submit(&self, _queue: vk::Queue, submit: &FrameSubmit) -> VkResult<()> {
        self.frame_op("submit")?;
        self.record(Call::Submit(*submit));
        Ok(())
    }

    fn queue_present(&self, _queue: vk::Queue, present: &FramePresent) -> VkResult<bool> {
        self.frame_op("present")?;
        self.record(Call::Present(*present));
        Ok(self.state.borrow().present_suboptimal)
    }
}

/// One fake GPU; each family is (graphics, can present)
#[derive(Debug, Clone)]
pub struct MockGpu {
    pub name: &'static str,
    pub families: Vec<(bool, bool)>,
    pub extensions: Vec<&'static CStr>,
    pub support: SurfaceSupport,
}

impl MockGpu {
    /// A single family doing both roles, swapchain extension and a usual surface
    pub fn capable(name: &'static str) -> Self {
        Self {
            name,
            families: vec![(true, true)],
            extensions: vec![ash::khr::swapchain::NAME],
            support: SurfaceSupport {
                capabilities: vk::SurfaceCapabilitiesKHR {
                    min_image_count: 2,
                    max_image_count: 3,
                    current_extent: vk::Extent2D {
                        width: 800,
                        height: 600,
                    },
                    min_image_extent: vk::Extent2D {
                        width: 1,
                        height: 1,
                    },
                    max_image_extent: vk::Extent2D {
                        width: 4096,
                        height: 4096,
                    },
                    max_image_array_layers: 1,
                    current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                    ..Default::default()
                },
                formats: vec![vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                }],
                present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub physical_device: vk::PhysicalDevice,
    pub queue_families: Vec<u32>,
    pub extensions: Vec<CString>,
    pub layers: Vec<CString>,
}

pub struct MockInstance {
    pub gpus: Vec<MockGpu>,
    pub device: MockDevice,
    requests: RefCell<Vec<RecordedRequest>>,
    surface_queries: RefCell<Vec<vk::PhysicalDevice>>,
    fail_device: RefCell<bool>,
    destroyed: Cell<bool>,
}

impl MockInstance {
    pub fn new(gpus: Vec<MockGpu>) -> Self {
        Self::with_device(gpus, MockDevice::new())
    }

    pub fn with_device(gpus: Vec<MockGpu>, device: MockDevice) -> Self {
        Self {
            gpus,
            device,
            requests: RefCell::new(Vec::new()),
            surface_queries: RefCell::new(Vec::new()),
            fail_device: RefCell::new(false),
            destroyed: Cell::new(false),
        }
    }

    pub fn fail_device_creation(&self) {
        *self.fail_device.borrow_mut() = true;
    }

    pub fn label(&self, physical_device: vk::PhysicalDevice) -> &'static str {
        self.gpu(physical_device).name
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub fn surface_queries(&self) -> Vec<vk::PhysicalDevice> {
        self.surface_queries.borrow().clone()
    }

    fn gpu(&self, physical_device: vk::PhysicalDevice) -> &MockGpu {
        &self.gpus[physical_device.as_raw() as usize - 1]
    }
}

impl InstanceApi for MockInstance {
    type Device = MockDevice;

    fn physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok((1..=self.gpus.len() as u64)
            .map(vk::PhysicalDevice::from_raw)
            .collect())
    }

    fn device_label(&self, physical_device: vk::PhysicalDevice) -> String {
        self.label(physical_device).to_string()
    }

    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        self.gpu(physical_device)
            .families
            .iter()
            .map(|&(graphics, _)| vk::QueueFamilyProperties {
                queue_flags: if graphics {
                    vk::QueueFlags::GRAPHICS
                } else {
                    vk::QueueFlags::TRANSFER
                },
                queue_count: 1,
                ..Default::default()
            })
            .collect()
    }

    fn present_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        Ok(self.gpu(physical_device).families[queue_family as usize].1)
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        Ok(self
            .gpu(physical_device)
            .extensions
            .iter()
            .map(|&name| CString::from(name))
            .collect())
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<SurfaceSupport> {
        self.surface_queries.borrow_mut().push(physical_device);
        Ok(self.gpu(physical_device).support.clone())
    }

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        request: &DeviceRequest<'_>,
    ) -> VkResult<MockDevice> {
        self.requests.borrow_mut().push(RecordedRequest {
            physical_device,
            queue_families: request.queue_families.to_vec(),
            extensions: request.extensions.iter().map(|&e| CString::from(e)).collect(),
            layers: request.layers.iter().map(|&l| CString::from(l)).collect(),
        });

        if *self.fail_device.borrow() {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }

        self.device.open();
        Ok(self.device.clone())
    }
}

// Surfaces share the device's handle space; the instance is logged as ("instance", 0)
impl InstanceOwner for MockInstance {
    fn create_surface(
        &self,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        self.device.create("surface").map(vk::SurfaceKHR::from_raw)
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.device.destroy("surface", surface.as_raw());
    }

    fn destroy_instance(&self) {
        assert!(!self.destroyed.replace(true), "instance destroyed twice");
        self.device.record(Call::Destroy("instance", 0));
    }
}
