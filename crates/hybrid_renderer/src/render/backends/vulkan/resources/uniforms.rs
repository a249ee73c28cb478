//! Per-frame uniform buffers and the frame descriptor set
//!
//! There is one buffer per uniform block, not one per ring slot. Updates are
//! recorded into the command stream (see [`Buffer::record_uniform_update`]),
//! so frames in flight and successive views of one frame each see the values
//! recorded before their draws.

use ash::vk;

use super::buffer::Buffer;
use super::descriptor_set::{frame_binding, DescriptorLayouts, DescriptorPool, DescriptorSetWriter};
use crate::graphics::error::RenderResult;
use crate::graphics::uniforms::{CameraUniform, LightUniform, ShadowUniform};
use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::GpuDevice;

/// Camera, light and shadow uniforms bound as set 0
pub struct FrameUniforms {
    /// Camera block
    pub camera: Buffer,
    /// Light block
    pub lights: Buffer,
    /// Shadow block
    pub shadow: Buffer,
    set: vk::DescriptorSet,
}

fn zeroed_uniform<T: bytemuck::Pod>(gpu: &GpuDevice, pool: &CommandPool) -> RenderResult<Buffer> {
    Ok(Buffer::device_local(
        gpu,
        pool,
        &[T::zeroed()],
        vk::BufferUsageFlags::UNIFORM_BUFFER,
    )?)
}

impl FrameUniforms {
    /// Allocate the buffers and write the frame set
    pub fn new(
        gpu: &GpuDevice,
        command_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        layouts: &DescriptorLayouts,
        shadow_map: vk::DescriptorImageInfo,
        brdf_lut: vk::DescriptorImageInfo,
    ) -> RenderResult<Self> {
        let camera = zeroed_uniform::<CameraUniform>(gpu, command_pool)?;
        let lights = zeroed_uniform::<LightUniform>(gpu, command_pool)?;
        let shadow = zeroed_uniform::<ShadowUniform>(gpu, command_pool)?;

        let set = descriptor_pool.allocate(layouts.frame.handle())?;
        DescriptorSetWriter::new()
            .write_buffer(set, frame_binding::CAMERA, camera.handle())
            .write_buffer(set, frame_binding::LIGHTS, lights.handle())
            .write_buffer(set, frame_binding::SHADOW, shadow.handle())
            .write_image(set, frame_binding::SHADOW_MAP, shadow_map)
            .write_image(set, frame_binding::BRDF_LUT, brdf_lut)
            .update(&gpu.device);

        Ok(Self {
            camera,
            lights,
            shadow,
            set,
        })
    }

    /// Set 0 of every pipeline that reads frame data
    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }
}
