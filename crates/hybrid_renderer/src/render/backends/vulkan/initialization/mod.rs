// Vulkan initialization components

pub mod context;
pub mod surface;
