//! Window integration for presentation
//!
//! The backend never talks to a windowing library directly. A window hands
//! over its instance extensions, creates the surface and reports its
//! framebuffer size through [`NativeWindow`].

use ash::vk;
use ash::{Entry, Instance};
use std::ffi::CString;

use super::context::VulkanResult;

/// A window the backend can present to
pub trait NativeWindow {
    /// Instance extensions needed to create a surface for this window
    fn required_instance_extensions(&self) -> VulkanResult<Vec<CString>>;

    /// Create the presentation surface
    fn create_surface(&mut self, entry: &Entry, instance: &Instance) -> VulkanResult<vk::SurfaceKHR>;

    /// Current framebuffer size in pixels
    fn framebuffer_size(&self) -> (u32, u32);
}
