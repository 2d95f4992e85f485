// =============================================================================
// VULKAN TRIANGLE - Bootstrap and frame loop
// =============================================================================
//
// STARTUP ORDER:
// 1. Shaders (SPIR-V from disk)
// 2. Window
// 3. Instance + surface
// 4. GPU selection, logical device, swapchain, image views
// 5. Command pool
// 6. Render pass, pipeline, framebuffers, sync objects
//
// Everything is a local below, so teardown runs in reverse declaration order
// once the device has gone idle.
//
// =============================================================================

use anyhow::{Context, Result};
use ash::vk;
use vk_triangle::backend::{
    create_command_pool, DeviceConfig, DeviceContext, FrameRenderer, InstanceConfig,
    InstanceContext, ShaderBytecode, VulkanDevice,
};
use vk_triangle::config::Config;
use vk_triangle::platform::Platform;

const APPLICATION_NAME: &std::ffi::CStr = c"Vulkan project";

fn main() {
    init_logging();

    if let Err(e) = run() {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(-1);
    }
}

fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_default_env();
    builder.init();
}

fn run() -> Result<()> {
    let config = Config::load();
    let validation = config.validation_enabled();

    log::info!("Starting Vulkan triangle");

    let shaders = ShaderBytecode::load(&config.shaders.vertex, &config.shaders.fragment)
        .context("Failed to load shaders")?;

    let mut platform = Platform::new(&config.window)?;

    let mut instance = InstanceContext::new(
        platform.window(),
        &InstanceConfig::new(APPLICATION_NAME, validation),
    )
    .context("Failed to initialize Vulkan")?;
    let surface = instance
        .create_surface(platform.window())
        .context("Failed to create surface")?;

    let (width, height) = platform.framebuffer_size();
    let device = DeviceContext::new(
        instance.api(),
        surface,
        vk::Extent2D { width, height },
        &DeviceConfig::new(validation),
    )
    .context("Failed to set up the GPU")?;

    let swapchain = device.swapchain()?;
    let command_pool = create_command_pool(device.device(), device.queue_families().graphics)?;
    let mut renderer =
        FrameRenderer::new(device.device(), swapchain, command_pool.raw(), &shaders)
            .context("Failed to create the renderer")?;

    log::info!("Vulkan initialized successfully!");

    // Resources may still be in use by the GPU whichever way the loop ends
    let frames = frame_loop(&mut platform, &mut renderer, &device);
    let idle = device.wait_idle();

    log::info!("Rendered {} frames, cleaning up...", frames.as_ref().copied().unwrap_or(0));
    frames?;
    idle?;
    Ok(())
}

fn frame_loop(
    platform: &mut Platform,
    renderer: &mut FrameRenderer<'_, VulkanDevice>,
    device: &DeviceContext<VulkanDevice>,
) -> Result<u64> {
    let swapchain = device.swapchain()?;
    let mut frames = 0;

    while !platform.should_close() {
        platform.pump_events();
        if platform.should_close() {
            break;
        }

        renderer
            .draw_frame(
                swapchain.handle,
                swapchain.extent,
                device.graphics_queue(),
                device.present_queue(),
            )
            .context("Frame failed")?;
        frames += 1;
    }

    Ok(frames)
}
