// Shader module loading
//
// Vulkan consumes SPIR-V words. Files are read whole; a length that is not a
// multiple of 4 bytes is rejected before any module is created.

use ash::vk;
use std::fs::File;
use std::io;
use std::path::Path;

use super::error::{Error, Result};
use super::gpu::GpuDevice;
use super::handle::Owned;

pub const DEFAULT_VERTEX_SHADER: &str = "../shaders/vert.spv";
pub const DEFAULT_FRAGMENT_SHADER: &str = "../shaders/frag.spv";

/// SPIR-V for both pipeline stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBytecode {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderBytecode {
    pub fn load(vertex_path: impl AsRef<Path>, fragment_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            vertex: read_spirv(vertex_path.as_ref())?,
            fragment: read_spirv(fragment_path.as_ref())?,
        })
    }

    pub fn from_words(vertex: Vec<u32>, fragment: Vec<u32>) -> Self {
        Self { vertex, fragment }
    }
}

/// Read a SPIR-V file into words, fixing up endianness
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let shader_load = |source: io::Error| Error::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(shader_load)?;
    let words = ash::util::read_spv(&mut file).map_err(shader_load)?;

    log::debug!("Loaded shader {:?} ({} words)", path, words.len());
    Ok(words)
}

pub fn create_shader_module<'d, D: GpuDevice + ?Sized>(
    device: &'d D,
    code: &[u32],
) -> Result<Owned<'d, D, vk::ShaderModule>> {
    let module = device
        .create_shader_module(code)
        .map_err(Error::creation("create shader module"))?;

    Ok(Owned::new(device, module))
}
