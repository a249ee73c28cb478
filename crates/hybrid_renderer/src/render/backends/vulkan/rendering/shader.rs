//! SPIR-V shader modules
//!
//! Compiled shaders are looked up as `<shader_dir>/<name>.spv`, e.g.
//! `gbuffer.frag.spv`; the build script writes them there.

use std::ffi::CStr;
use std::path::{Path, PathBuf};

use ash::{vk, Device};

use crate::graphics::error::{RenderError, RenderResult};
use crate::render::backends::vulkan::VulkanError;

/// Entry point of every shader
pub const ENTRY_POINT: &CStr = match CStr::from_bytes_with_nul(b"main\0") {
    Ok(name) => name,
    Err(_) => panic!("entry point is not nul terminated"),
};

/// SPIR-V shader module wrapper with automatic resource management
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V bytecode
    pub fn from_bytes(device: &Device, bytes: &[u8]) -> RenderResult<Self> {
        if bytes.len() % 4 != 0 {
            return Err(RenderError::Shader(format!(
                "SPIR-V size {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let words = ash::util::read_spv(&mut std::io::Cursor::new(bytes))
            .map_err(|e| RenderError::Shader(format!("Invalid SPIR-V: {e}")))?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Load shader from SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: &Device, path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| RenderError::Shader(format!("Failed to read {}: {e}", path.display())))?;
        log::debug!("Loaded shader {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(device, &bytes)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Loads compiled shaders by name from one directory
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    dir: PathBuf,
}

impl ShaderLibrary {
    /// Library rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of a compiled shader, `name` being e.g. `"skybox.frag"`
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.spv"))
    }

    /// Load a compiled shader
    pub fn load(&self, device: &Device, name: &str) -> RenderResult<ShaderModule> {
        let path = self.path(name);
        if !path.exists() {
            return Err(RenderError::Shader(format!(
                "{} not found; compile the shaders with the Vulkan SDK",
                path.display()
            )));
        }
        ShaderModule::from_file(device, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_paths() {
        let library = ShaderLibrary::new("target/shaders");
        assert_eq!(
            library.path("gbuffer_maps.frag"),
            Path::new("target/shaders").join("gbuffer_maps.frag.spv")
        );
        assert_eq!(ENTRY_POINT.to_bytes(), b"main");
    }
}
