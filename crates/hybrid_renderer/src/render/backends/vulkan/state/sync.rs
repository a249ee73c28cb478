//! Vulkan synchronization primitives
//!
//! RAII wrappers for semaphores and fences. Fences pace the CPU against the
//! GPU, semaphores order the acquire, blit and present of a swapchain image.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// GPU-GPU synchronization primitive
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe { device.create_semaphore(&create_info, None).map_err(VulkanError::Api)? };

        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-GPU synchronization primitive
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe { device.create_fence(&create_info, None).map_err(VulkanError::Api)? };

        Ok(Self { device, fence })
    }

    /// Wait for the fence; `vk::Result::TIMEOUT` is returned as an API error
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Reset to unsignaled
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]).map_err(VulkanError::Api) }
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Objects for one in-flight present: acquire, blit, present
pub struct FrameSync {
    /// Signaled when the swapchain image is ready to be written
    pub image_available: Semaphore,
    /// Signaled when the blit into the swapchain image finished
    pub render_finished: Semaphore,
    /// Signaled when the blit submission completed
    pub in_flight: Fence,
    /// Command buffer recording the blit
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSync {
    /// Create the objects with a signaled fence
    pub fn new(device: &Device, command_buffer: vk::CommandBuffer) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
            command_buffer,
        })
    }

    /// Replace the acquire semaphore, once the device is idle, when its signal will never be waited on
    pub fn renew_image_available(&mut self, device: &Device) -> VulkanResult<()> {
        self.image_available = Semaphore::new(device.clone())?;
        Ok(())
    }
}
