//! Vulkan buffer management

use ash::{vk, Device};

use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::{GpuDevice, VulkanError, VulkanResult};

/// Vulkan buffer wrapper with automatic cleanup
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory with `properties`
    pub fn new(
        gpu: &GpuDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = gpu.device.clone();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size.max(4))
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None).map_err(VulkanError::Api)? };

        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index =
            match find_memory_type(&gpu.memory_properties, mem_requirements.memory_type_bits, properties) {
                Ok(index) => index,
                Err(e) => {
                    unsafe { device.destroy_buffer(buffer, None) };
                    return Err(e);
                }
            };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        // from here on Drop releases both
        let created = Self {
            device,
            buffer,
            memory,
            size,
        };
        unsafe {
            created
                .device
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        Ok(created)
    }

    /// Host-visible buffer holding `data`, used as a transfer source
    pub fn staging(gpu: &GpuDevice, data: &[u8]) -> VulkanResult<Self> {
        let buffer = Self::new(
            gpu,
            data.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write_data(data)?;
        Ok(buffer)
    }

    /// Device-local buffer filled through a staging copy; blocks until the copy finished
    pub fn device_local<T: bytemuck::Pod>(
        gpu: &GpuDevice,
        pool: &CommandPool,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let staging = Self::staging(gpu, bytes)?;
        let buffer = Self::new(
            gpu,
            bytes.len() as vk::DeviceSize,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        pool.submit_and_wait(|command_buffer| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: bytes.len() as vk::DeviceSize,
            };
            unsafe {
                gpu.device
                    .cmd_copy_buffer(command_buffer, staging.handle(), buffer.handle(), &[region]);
            }
            Ok::<(), VulkanError>(())
        })?;

        Ok(buffer)
    }

    /// Copy `data` into host-visible memory
    pub fn write_data<T: bytemuck::Pod>(&self, data: &[T]) -> VulkanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Writing {} bytes into a {} byte buffer", bytes.len(), self.size),
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        unsafe {
            let data_ptr = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), data_ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Record an in-stream update of a uniform buffer
    ///
    /// Barriers order the write after every earlier shader read and before
    /// every later one, so a single buffer serves all frames in flight and
    /// several views within one frame. Must be recorded outside a render pass.
    pub fn record_uniform_update<T: bytemuck::Pod>(&self, command_buffer: vk::CommandBuffer, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        let shader_stages = vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER;

        let before = vk::BufferMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::UNIFORM_READ)
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(self.buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .build();
        let after = vk::BufferMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::UNIFORM_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(self.buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .build();

        unsafe {
            self.device.cmd_pipeline_barrier(
                command_buffer,
                shader_stages,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[before],
                &[],
            );
            self.device.cmd_update_buffer(command_buffer, self.buffer, 0, bytes);
            self.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                shader_stages,
                vk::DependencyFlags::empty(),
                &[],
                &[after],
                &[],
            );
        }
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size requested at creation
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Index of a memory type allowed by `type_filter` that has all of `properties`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in properties.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        properties
    }

    #[test]
    fn test_memory_type_respects_filter_and_flags() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let properties = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, host, host]);

        assert_eq!(
            find_memory_type(&properties, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
        assert_eq!(find_memory_type(&properties, 0b100, host).unwrap(), 2);
        assert!(matches!(
            find_memory_type(&properties, 0b001, host),
            Err(VulkanError::NoSuitableMemoryType)
        ));
    }
}
