// Frame renderer - pipeline objects, sync primitives and the per-frame protocol
//
// Each frame:
//   1. wait for the in-flight fence, reset it
//   2. acquire an image, signalling image-available
//   3. re-record the single command buffer for that image's framebuffer
//   4. submit: wait image-available, signal render-finished[image]
//   5. present: wait render-finished[image]
//
// The semaphore signalled for an image is indexed by the acquired image,
// never by a frame counter.

use ash::vk;

use super::error::{Error, Result};
use super::gpu::{FramePresent, FrameSubmit, GpuDevice};
use super::handle::Owned;
use super::pipeline::{
    create_framebuffers, create_graphics_pipeline, create_pipeline_layout, create_render_pass,
};
use super::shader::{create_shader_module, ShaderBytecode};
use super::swapchain::SwapchainState;
use super::sync::FrameSync;

const CLEAR_COLOR: vk::ClearValue = vk::ClearValue {
    color: vk::ClearColorValue {
        float32: [0.0, 0.0, 0.0, 1.0],
    },
};

const TRIANGLE_VERTICES: u32 = 3;

/// Field order is teardown order
pub struct FrameRenderer<'d, D: GpuDevice + ?Sized> {
    // Only held so they are destroyed with the renderer
    _vertex_shader: Owned<'d, D, vk::ShaderModule>,
    _fragment_shader: Owned<'d, D, vk::ShaderModule>,
    _pipeline_layout: Owned<'d, D, vk::PipelineLayout>,
    render_pass: Owned<'d, D, vk::RenderPass>,
    pipeline: Owned<'d, D, vk::Pipeline>,
    framebuffers: Vec<Owned<'d, D, vk::Framebuffer>>,
    sync: FrameSync<'d, D>,
    device: &'d D,
    // Freed with the pool it came from
    command_buffer: vk::CommandBuffer,
}

impl<'d, D: GpuDevice + ?Sized> FrameRenderer<'d, D> {
    pub fn new(
        device: &'d D,
        swapchain: &SwapchainState,
        command_pool: vk::CommandPool,
        shaders: &ShaderBytecode,
    ) -> Result<Self> {
        if swapchain.image_views.len() != swapchain.images.len() {
            return Err(Error::RendererCreation {
                stage: "match image views to swapchain images",
                result: vk::Result::ERROR_INITIALIZATION_FAILED,
            });
        }

        let vertex_shader = create_shader_module(device, &shaders.vertex)?;
        let fragment_shader = create_shader_module(device, &shaders.fragment)?;
        let render_pass = create_render_pass(device, swapchain.format())?;
        let pipeline_layout = create_pipeline_layout(device)?;
        let pipeline = create_graphics_pipeline(
            device,
            render_pass.raw(),
            pipeline_layout.raw(),
            vertex_shader.raw(),
            fragment_shader.raw(),
        )?;
        let framebuffers = create_framebuffers(
            device,
            render_pass.raw(),
            &swapchain.image_views,
            swapchain.extent,
        )?;
        let command_buffer = device
            .allocate_command_buffer(command_pool)
            .map_err(Error::creation("allocate command buffer"))?;
        let sync = FrameSync::new(device, swapchain.images.len())?;

        log::info!(
            "Frame renderer ready: {} framebuffers, {}x{}",
            framebuffers.len(),
            swapchain.extent.width,
            swapchain.extent.height
        );

        Ok(Self {
            _vertex_shader: vertex_shader,
            _fragment_shader: fragment_shader,
            _pipeline_layout: pipeline_layout,
            render_pass,
            pipeline,
            framebuffers,
            sync,
            device,
            command_buffer,
        })
    }

    /// Render and present one frame, returning the presented image index
    ///
    /// The renderer is unusable after any `Error::Render`. The in-flight fence
    /// is reset before the image is acquired, so a frame that fails before
    /// its submit leaves the fence unsignaled and the next call would wait on
    /// it forever.
    pub fn draw_frame(
        &mut self,
        swapchain: vk::SwapchainKHR,
        extent: vk::Extent2D,
        graphics_queue: vk::Queue,
        present_queue: vk::Queue,
    ) -> Result<u32> {
        let fence = self.sync.in_flight.raw();
        self.device
            .wait_for_fence(fence, u64::MAX)
            .map_err(Error::render("wait for the in-flight fence"))?;
        self.device
            .reset_fence(fence)
            .map_err(Error::render("reset the in-flight fence"))?;

        let image_available = self.sync.image_available.raw();
        let (image_index, suboptimal) = self
            .device
            .acquire_next_image(swapchain, u64::MAX, image_available)
            .map_err(Error::render("acquire a swapchain image"))?;
        if suboptimal {
            log::warn!("Acquired image {} is suboptimal for the surface", image_index);
        }

        let framebuffer = self.framebuffers.get(image_index as usize).map(Owned::raw);
        let (Some(framebuffer), Some(render_finished)) =
            (framebuffer, self.sync.render_finished(image_index))
        else {
            return Err(Error::Render {
                stage: "look up acquired image",
                result: vk::Result::ERROR_UNKNOWN,
            });
        };

        self.record(framebuffer, extent)?;

        let submit = FrameSubmit {
            wait_semaphore: image_available,
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            command_buffer: self.command_buffer,
            signal_semaphore: render_finished,
            fence,
        };
        self.device
            .queue_submit(graphics_queue, &submit)
            .map_err(Error::render("submit the command buffer"))?;

        let present = FramePresent {
            wait_semaphore: render_finished,
            swapchain,
            image_index,
        };
        let suboptimal = self
            .device
            .queue_present(present_queue, &present)
            .map_err(Error::render("present"))?;
        if suboptimal {
            log::warn!("Presented image {} is suboptimal for the surface", image_index);
        }

        log::trace!("Presented image {}", image_index);
        Ok(image_index)
    }

    fn record(&self, framebuffer: vk::Framebuffer, extent: vk::Extent2D) -> Result<()> {
        let cmd = self.command_buffer;

        self.device
            .reset_command_buffer(cmd)
            .map_err(Error::render("reset the command buffer"))?;
        self.device
            .begin_command_buffer(cmd)
            .map_err(Error::render("begin recording"))?;

        let clear_values = [CLEAR_COLOR];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.raw())
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        self.device.cmd_begin_render_pass(cmd, &render_pass_info);
        self.device.cmd_bind_pipeline(cmd, self.pipeline.raw());

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        self.device.cmd_set_viewport(cmd, &viewport);
        self.device.cmd_set_scissor(cmd, &render_area);

        self.device.cmd_draw(cmd, TRIANGLE_VERTICES, 1);
        self.device.cmd_end_render_pass(cmd);

        self.device
            .end_command_buffer(cmd)
            .map_err(Error::render("end recording"))
    }
}

impl<D: GpuDevice + ?Sized> Drop for FrameRenderer<'_, D> {
    fn drop(&mut self) {
        log::debug!("Destroying frame renderer...");
    }
}
