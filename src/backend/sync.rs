// Synchronization primitives
//
// One frame in flight: a single image-available semaphore and fence, plus a
// render-finished semaphore per swapchain image. The presentation engine may
// still hold the render-finished semaphore of an image until that image is
// acquired again, so it cannot be shared across images.

use ash::vk;

use super::error::{Error, Result};
use super::gpu::GpuDevice;
use super::handle::Owned;

/// Fields drop in declaration order
pub struct FrameSync<'d, D: GpuDevice + ?Sized> {
    pub image_available: Owned<'d, D, vk::Semaphore>,
    pub render_finished: Vec<Owned<'d, D, vk::Semaphore>>,
    /// Created signaled so the first frame does not wait forever
    pub in_flight: Owned<'d, D, vk::Fence>,
}

impl<'d, D: GpuDevice + ?Sized> FrameSync<'d, D> {
    pub fn new(device: &'d D, image_count: usize) -> Result<Self> {
        let semaphore = || {
            device
                .create_semaphore()
                .map(|semaphore| Owned::new(device, semaphore))
                .map_err(Error::creation("create semaphore"))
        };

        let image_available = semaphore()?;
        let render_finished = (0..image_count)
            .map(|_| semaphore())
            .collect::<Result<Vec<_>>>()?;

        let in_flight = device
            .create_fence(true)
            .map_err(Error::creation("create fence"))?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight: Owned::new(device, in_flight),
        })
    }

    /// Semaphore signalled when rendering to `image_index` completes
    pub fn render_finished(&self, image_index: u32) -> Option<vk::Semaphore> {
        self.render_finished
            .get(image_index as usize)
            .map(Owned::raw)
    }
}
