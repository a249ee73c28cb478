//! Backend implementations of [`GraphicsBackend`](crate::graphics::GraphicsBackend)

pub mod vulkan;
