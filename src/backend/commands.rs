// Command pool for the graphics queue family

use ash::vk;

use super::error::{Error, Result};
use super::gpu::GpuDevice;
use super::handle::Owned;

/// Buffers from this pool can be reset one by one, which the frame loop needs
pub fn create_command_pool<D: GpuDevice + ?Sized>(
    device: &D,
    queue_family: u32,
) -> Result<Owned<'_, D, vk::CommandPool>> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
        .queue_family_index(queue_family);

    let pool = device
        .create_command_pool(&pool_info)
        .map_err(Error::creation("create command pool"))?;

    log::debug!("Created command pool for queue family {}", queue_family);
    Ok(Owned::new(device, pool))
}
