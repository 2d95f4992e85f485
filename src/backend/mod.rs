// Backend module - Vulkan bootstrap
//
// Design: thin layer over ash; every driver call goes through the
// `InstanceOwner` / `InstanceApi` / `GpuDevice` traits so selection, teardown
// order and the frame protocol can be exercised without a GPU.

pub mod commands;
pub mod device;
pub mod error;
pub mod gpu;
pub mod handle;
pub mod instance;
pub mod pipeline;
pub mod renderer;
pub mod shader;
pub mod swapchain;
pub mod sync;

#[cfg(test)]
pub(crate) mod mock;

pub use commands::create_command_pool;
pub use device::{DeviceConfig, DeviceContext, VulkanDevice};
pub use error::{Error, InitError, Result};
pub use gpu::{GpuDevice, InstanceApi, InstanceOwner};
pub use handle::Owned;
pub use instance::{InstanceConfig, InstanceContext, VulkanInstance};
pub use renderer::FrameRenderer;
pub use shader::ShaderBytecode;
pub use swapchain::SwapchainState;
