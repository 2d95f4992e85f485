// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Window, validation and shader settings. `load` never fails: a missing or
// broken file means defaults. `parse_strict` insists on every window key.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::backend::shader::{DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};

pub const CONFIG_FILE: &str = "config.toml";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub debug: DebugConfig,
    pub shaders: ShaderConfig,
}

/// Window settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan App".to_string(),
            width: 80,
            height: 60,
            fullscreen: false,
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
        }
    }
}

/// Compiled SPIR-V locations
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from(DEFAULT_VERTEX_SHADER),
            fragment: PathBuf::from(DEFAULT_FRAGMENT_SHADER),
        }
    }
}

/// `[window]` with no defaults
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictWindow {
    width: u32,
    height: u32,
    title: String,
    fullscreen: bool,
}

#[derive(Deserialize)]
struct StrictRoot {
    window: StrictWindow,
    #[serde(default)]
    debug: DebugConfig,
    #[serde(default)]
    shaders: ShaderConfig,
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE).unwrap_or_else(|e| {
            log::warn!("Failed to load {}: {:#}. Using defaults.", CONFIG_FILE, e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Missing keys take their defaults
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Every `[window]` key must be present
    pub fn parse_strict(content: &str) -> Result<Self> {
        let root: StrictRoot = toml::from_str(content).context("Incomplete window configuration")?;

        Ok(Self {
            window: WindowConfig {
                title: root.window.title,
                width: root.window.width,
                height: root.window.height,
                fullscreen: root.window.fullscreen,
            },
            debug: root.debug,
            shaders: root.shaders,
        })
    }

    /// Validation only ever runs in debug builds
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.debug.validation_layers
    }
}
