// Vulkan state management

pub mod frame;
pub mod swapchain;
pub mod sync;
