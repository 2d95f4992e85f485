// Ownership guard for device-created handles
//
// Vulkan handles are plain `Copy` values. `Owned` ties one to the device that
// created it and destroys it exactly once when dropped, so a failed
// construction sequence releases everything it already built.

use ash::vk;
use std::fmt;
use std::mem::ManuallyDrop;

use super::gpu::GpuDevice;

/// A handle type that a `GpuDevice` knows how to destroy
pub trait DeviceObject: Copy + fmt::Debug {
    fn destroy<D: GpuDevice + ?Sized>(self, device: &D);
}

macro_rules! device_objects {
    ($($ty:ty => $destroy:ident),* $(,)?) => {
        $(
            impl DeviceObject for $ty {
                fn destroy<D: GpuDevice + ?Sized>(self, device: &D) {
                    device.$destroy(self);
                }
            }
        )*
    };
}

device_objects! {
    vk::SwapchainKHR => destroy_swapchain,
    vk::ImageView => destroy_image_view,
    vk::ShaderModule => destroy_shader_module,
    vk::RenderPass => destroy_render_pass,
    vk::PipelineLayout => destroy_pipeline_layout,
    vk::Pipeline => destroy_pipeline,
    vk::Framebuffer => destroy_framebuffer,
    vk::CommandPool => destroy_command_pool,
    vk::Semaphore => destroy_semaphore,
    vk::Fence => destroy_fence,
}

/// Exclusively owned handle, destroyed on drop
pub struct Owned<'d, D: GpuDevice + ?Sized, H: DeviceObject> {
    device: &'d D,
    handle: H,
}

impl<'d, D: GpuDevice + ?Sized, H: DeviceObject> Owned<'d, D, H> {
    pub fn new(device: &'d D, handle: H) -> Self {
        Self { device, handle }
    }

    /// The raw handle; ownership stays with the guard
    pub fn raw(&self) -> H {
        self.handle
    }

    /// Hands the handle to a longer-lived owner that destroys it itself
    pub fn into_raw(self) -> H {
        let this = ManuallyDrop::new(self);
        this.handle
    }
}

impl<D: GpuDevice + ?Sized, H: DeviceObject> Drop for Owned<'_, D, H> {
    fn drop(&mut self) {
        self.handle.destroy(self.device);
    }
}

impl<D: GpuDevice + ?Sized, H: DeviceObject> fmt::Debug for Owned<'_, D, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&self.handle).finish()
    }
}
