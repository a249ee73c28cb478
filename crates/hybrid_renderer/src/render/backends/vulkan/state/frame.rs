//! Command ring slots of the Vulkan backend

use ash::{vk, Device};

use super::sync::Fence;
use crate::graphics::error::{RenderError, RenderResult};
use crate::graphics::frame::FrameFence;
use crate::render::backends::vulkan::VulkanError;

/// One slot of the command ring: a fence and the command buffer it guards
///
/// The command buffer is allocated lazily so that `flush` can free every
/// buffer and the next `begin` gets a fresh one.
pub struct FrameSlot {
    fence: Fence,
    command_buffer: Option<vk::CommandBuffer>,
}

impl FrameSlot {
    /// Slot whose fence starts signaled, so the first `begin` does not block
    pub fn new(device: Device) -> RenderResult<Self> {
        Ok(Self {
            fence: Fence::new(device, true)?,
            command_buffer: None,
        })
    }

    /// Fence signaled by this slot's submission
    pub fn fence(&self) -> vk::Fence {
        self.fence.handle()
    }

    /// Command buffer of this slot, if allocated
    pub fn command_buffer(&self) -> Option<vk::CommandBuffer> {
        self.command_buffer
    }

    /// Store a freshly allocated command buffer
    pub fn set_command_buffer(&mut self, command_buffer: vk::CommandBuffer) {
        self.command_buffer = Some(command_buffer);
    }

    /// Hand back the command buffer so it can be freed
    pub fn take_command_buffer(&mut self) -> Option<vk::CommandBuffer> {
        self.command_buffer.take()
    }
}

impl FrameFence for FrameSlot {
    type Error = RenderError;

    fn wait(&self, timeout_ns: u64) -> RenderResult<()> {
        match self.fence.wait(timeout_ns) {
            Err(VulkanError::Api(vk::Result::TIMEOUT)) => Err(RenderError::Timeout {
                what: "frame fence",
                timeout_ns,
            }),
            result => Ok(result?),
        }
    }

    fn reset(&self) -> RenderResult<()> {
        Ok(self.fence.reset()?)
    }
}
