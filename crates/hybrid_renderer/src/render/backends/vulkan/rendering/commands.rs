//! Command pool and one-shot submissions

use ash::{vk, Device};

use crate::render::backends::vulkan::{GpuDevice, VulkanError, VulkanResult};

/// Vulkan command pool wrapper with automatic cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
    queue: vk::Queue,
}

impl CommandPool {
    /// Pool on the graphics family whose buffers can be reset individually
    pub fn new(gpu: &GpuDevice) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(gpu.graphics_family);

        let command_pool = unsafe {
            gpu.device
                .create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: gpu.device.clone(),
            command_pool,
            queue: gpu.graphics_queue,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Allocate a single primary command buffer
    pub fn allocate_one(&self) -> VulkanResult<vk::CommandBuffer> {
        self.allocate_command_buffers(1)?
            .pop()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "Driver returned no command buffer".to_string(),
            })
    }

    /// Return command buffers to the pool; they must not be pending
    pub fn free(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.command_pool, command_buffers);
        }
    }

    /// Record with `record`, submit, and block until the queue is idle
    pub fn submit_and_wait<E: From<VulkanError>>(
        &self,
        record: impl FnOnce(vk::CommandBuffer) -> Result<(), E>,
    ) -> Result<(), E> {
        let command_buffer = self.allocate_one()?;
        let result = self.record_and_submit(command_buffer, record);
        self.free(&[command_buffer]);
        result
    }

    fn record_and_submit<E: From<VulkanError>>(
        &self,
        command_buffer: vk::CommandBuffer,
        record: impl FnOnce(vk::CommandBuffer) -> Result<(), E>,
    ) -> Result<(), E> {
        begin_commands(&self.device, command_buffer)?;
        record(command_buffer)?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
            self.device
                .queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device.queue_wait_idle(self.queue).map_err(VulkanError::Api)?;
        }
        Ok(())
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Begin a command buffer for a single submission
pub fn begin_commands(device: &Device, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
    let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    unsafe {
        device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(VulkanError::Api)
    }
}

/// Full-target viewport and scissor
pub fn set_viewport(device: &Device, command_buffer: vk::CommandBuffer, extent: vk::Extent2D) {
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    unsafe {
        device.cmd_set_viewport(command_buffer, 0, &[viewport]);
        device.cmd_set_scissor(command_buffer, 0, &[scissor]);
    }
}

/// Begin `render_pass` over the whole framebuffer and set viewport and scissor to match
pub fn begin_render_pass(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    clear_values: &[vk::ClearValue],
) {
    let render_pass_begin = vk::RenderPassBeginInfo::builder()
        .render_pass(render_pass)
        .framebuffer(framebuffer)
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        })
        .clear_values(clear_values);

    unsafe {
        device.cmd_begin_render_pass(command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
    }
    set_viewport(device, command_buffer, extent);
}

/// Push a plain-data block to the stages given
pub fn push_constants<T: bytemuck::Pod>(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    layout: vk::PipelineLayout,
    stages: vk::ShaderStageFlags,
    data: &T,
) {
    unsafe {
        device.cmd_push_constants(command_buffer, layout, stages, 0, bytemuck::bytes_of(data));
    }
}
