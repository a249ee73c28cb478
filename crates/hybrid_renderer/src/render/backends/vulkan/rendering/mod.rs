// Vulkan rendering components

pub mod commands;
pub mod pipeline;
pub mod pipelines;
pub mod render_pass;
pub mod shader;
