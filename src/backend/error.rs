// Error taxonomy for the Vulkan backend
//
// Every creation step maps onto one variant so the driver can report which
// part of the bootstrap failed. Frame-time failures are all `Render`.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Instance and surface setup failures
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("validation layer {0} requested but not available")]
    ValidationUnavailable(String),

    #[error("window system handle unavailable: {0}")]
    Handle(#[from] raw_window_handle::HandleError),

    #[error("a surface is already bound to this instance")]
    SurfaceExists,

    #[error("failed to {stage}: {result}")]
    Vulkan {
        stage: &'static str,
        #[source]
        result: vk::Result,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("instance setup failed: {0}")]
    Init(#[from] InitError),

    #[error("no suitable GPU found: {0}")]
    NoSuitableDevice(String),

    #[error("failed to create logical device: {0}")]
    DeviceCreation(#[source] vk::Result),

    #[error("failed to {stage}: {result}")]
    Swapchain {
        stage: &'static str,
        #[source]
        result: vk::Result,
    },

    #[error("no swapchain has been created yet")]
    SwapchainMissing,

    #[error("failed to create image view {index}: {result}")]
    ImageView {
        index: usize,
        #[source]
        result: vk::Result,
    },

    #[error("failed to load shader {path:?}: {source}")]
    ShaderLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to {stage}: {result}")]
    RendererCreation {
        stage: &'static str,
        #[source]
        result: vk::Result,
    },

    #[error("frame failed to {stage}: {result}")]
    Render {
        stage: &'static str,
        #[source]
        result: vk::Result,
    },
}

impl InitError {
    pub(crate) fn vulkan(stage: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Vulkan { stage, result }
    }
}

impl Error {
    pub(crate) fn swapchain(stage: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Swapchain { stage, result }
    }

    pub(crate) fn creation(stage: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::RendererCreation { stage, result }
    }

    pub(crate) fn render(stage: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Render { stage, result }
    }
}
