// Window and event pumping
//
// The event loop is pumped from the render loop instead of owning it, so the
// Vulkan objects can live as plain locals in `main` and borrow each other.

use anyhow::{anyhow, bail, Result};
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use crate::config::WindowConfig;

/// Fixed-size window; fullscreen is borderless on the current monitor
pub fn window_attributes(config: &WindowConfig) -> WindowAttributes {
    let attributes = Window::default_attributes()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_resizable(false);

    if config.fullscreen {
        attributes.with_fullscreen(Some(Fullscreen::Borderless(None)))
    } else {
        attributes
    }
}

#[derive(Default)]
struct WindowEvents {
    pending: Option<WindowAttributes>,
    window: Option<Window>,
    create_error: Option<String>,
    close_requested: bool,
}

impl ApplicationHandler for WindowEvents {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.pending.take() else {
            return;
        };

        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(window),
            Err(e) => self.create_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                log::info!("ESC pressed, exiting...");
                self.close_requested = true;
            }
            _ => {}
        }
    }
}

pub struct Platform {
    window: Window,
    events: WindowEvents,
    event_loop: EventLoop<()>,
}

impl Platform {
    /// Open the window, pumping events until the platform hands it over
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let mut event_loop =
            EventLoop::new().map_err(|e| anyhow!("Failed to create event loop: {e}"))?;

        let mut events = WindowEvents {
            pending: Some(window_attributes(config)),
            ..Default::default()
        };

        let window = loop {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut events)
            {
                bail!("Event loop exited with code {code} before the window opened");
            }
            if let Some(e) = events.create_error.take() {
                bail!("Failed to create window: {e}");
            }
            if let Some(window) = events.window.take() {
                break window;
            }
        };

        log::info!(
            "Window: {}x{} ({})",
            config.width,
            config.height,
            if config.fullscreen { "fullscreen" } else { "windowed" }
        );

        Ok(Self {
            window,
            events,
            event_loop,
        })
    }

    /// Handle whatever is queued without blocking
    pub fn pump_events(&mut self) {
        if let PumpStatus::Exit(_) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.events)
        {
            self.events.close_requested = true;
        }
    }

    pub fn should_close(&self) -> bool {
        self.events.close_requested
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Drawable size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}
