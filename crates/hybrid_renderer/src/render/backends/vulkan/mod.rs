//! Vulkan backend implementation
//!
//! Organized into initialization, state, resources and rendering modules,
//! tied together by [`VulkanBackend`].

/// Instance, device and surface creation
pub mod initialization;

/// GPU resource wrappers (buffers, images, textures, descriptors, materials, meshes, environments, viewports)
pub mod resources;

/// Shaders, render passes, pipelines and command recording
pub mod rendering;

/// Swapchain, synchronization and frame slots
pub mod state;

/// Main Vulkan backend implementation
pub mod renderer;

pub use initialization::context::{GpuDevice, VulkanContext, VulkanError, VulkanResult};
pub use initialization::surface::NativeWindow;
pub use renderer::VulkanBackend;
