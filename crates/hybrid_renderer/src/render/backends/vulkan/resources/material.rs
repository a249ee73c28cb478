//! Materials on the GPU
//!
//! A material owns its uniform buffer and a descriptor set of the layout
//! matching its map count. The textures it samples are shared, so
//! destroying a texture handle never frees an image a live material binds.

use std::rc::Rc;

use ash::{vk, Device};

use super::buffer::Buffer;
use super::descriptor_set::{DescriptorLayouts, DescriptorPool, DescriptorSetWriter};
use super::texture::VulkanTexture;
use crate::graphics::desc::{MaterialDesc, MaterialFlags};
use crate::graphics::error::RenderResult;
use crate::graphics::material_layout::{MaterialLayout, MATERIAL_MAPS_BINDING, MATERIAL_UNIFORM_BINDING};
use crate::graphics::uniforms::MaterialUniform;
use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::GpuDevice;

/// Uniform, descriptor set and textures of one material
pub struct VulkanMaterial {
    device: Device,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
    flags: MaterialFlags,
    _uniform: Buffer,
    _maps: Vec<Rc<VulkanTexture>>,
}

impl VulkanMaterial {
    /// Upload the scalars and bind `maps`, given in map order
    pub fn new(
        gpu: &GpuDevice,
        command_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        layouts: &DescriptorLayouts,
        desc: &MaterialDesc,
        maps: Vec<Rc<VulkanTexture>>,
    ) -> RenderResult<Self> {
        let flags = desc.flags();
        let layout = MaterialLayout::from_flags(flags);
        let uniform = Buffer::device_local(
            gpu,
            command_pool,
            &[MaterialUniform::from(desc)],
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;

        let set = descriptor_pool.allocate(layouts.material(layout.map_count()))?;
        let mut writer = DescriptorSetWriter::new().write_buffer(set, MATERIAL_UNIFORM_BINDING, uniform.handle());
        if !maps.is_empty() {
            let infos: Vec<vk::DescriptorImageInfo> = maps.iter().map(|map| map.descriptor()).collect();
            writer = writer.write_images(set, MATERIAL_MAPS_BINDING, &infos);
        }
        writer.update(&gpu.device);

        Ok(Self {
            device: gpu.device.clone(),
            pool: descriptor_pool.handle(),
            set,
            flags,
            _uniform: uniform,
            _maps: maps,
        })
    }

    /// Flag bits the pipeline keys are derived from
    pub fn flags(&self) -> MaterialFlags {
        self.flags
    }

    /// Whether the material is drawn alpha blended after opaque geometry
    pub fn is_translucent(&self) -> bool {
        self.flags.contains(MaterialFlags::TRANSLUCENT)
    }

    /// Set 1 of the material pipelines
    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }
}

impl Drop for VulkanMaterial {
    fn drop(&mut self) {
        unsafe {
            // a failed free leaks the set until the pool is destroyed
            let _ = self.device.free_descriptor_sets(self.pool, &[self.set]);
        }
    }
}
