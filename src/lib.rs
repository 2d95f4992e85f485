//! Minimal Vulkan bootstrap: pick a GPU, build a swapchain and one fixed
//! pipeline, then draw a hardcoded triangle every frame.

pub mod backend;
pub mod config;
pub mod platform;
