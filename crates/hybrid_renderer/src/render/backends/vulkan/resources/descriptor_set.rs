//! Descriptor set layouts, pools and writes
//!
//! Set numbering shared by every pipeline:
//!
//! | set | contents |
//! |-----|----------|
//! | 0   | frame: camera, lights, shadow uniforms, shadow map, BRDF table |
//! | 1   | material, or the input images of a fullscreen pass |
//! | 2   | environment: skybox, irradiance and prefiltered cubes |

use ash::{vk, Device};

use crate::graphics::limits::GraphicsLimits;
use crate::graphics::material_layout::{MATERIAL_MAPS_BINDING, MATERIAL_UNIFORM_BINDING};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Bindings of the frame set
pub mod frame_binding {
    /// Camera uniform
    pub const CAMERA: u32 = 0;
    /// Light uniform
    pub const LIGHTS: u32 = 1;
    /// Shadow uniform
    pub const SHADOW: u32 = 2;
    /// Cascaded shadow map array
    pub const SHADOW_MAP: u32 = 3;
    /// BRDF integration table
    pub const BRDF_LUT: u32 = 4;
}

/// Builder for descriptor set layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_combined_image_sampler_array(binding, 1, stage_flags)
    }

    /// Add an array of `count` combined image samplers at one binding
    pub fn add_combined_image_sampler_array(mut self, binding: u32, count: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(count)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// Get the layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool whose sets can be freed individually
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a pool for up to `max_sets` sets
    pub fn new(device: Device, max_sets: u32) -> VulkanResult<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(max_sets * 3)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(max_sets * GraphicsLimits::MAX_MATERIAL_MAPS as u32)
                .build(),
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self { pool, device })
    }

    /// Allocate one set of `layout`
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(VulkanError::Api)?
            .pop()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "Driver returned no descriptor set".to_string(),
            })
    }

    /// Return sets to the pool
    pub fn free(&self, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        if sets.is_empty() {
            return Ok(());
        }
        unsafe { self.device.free_descriptor_sets(self.pool, sets) }.map_err(VulkanError::Api)
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

enum PendingWrite {
    Buffer {
        set: vk::DescriptorSet,
        binding: u32,
        info: usize,
    },
    Images {
        set: vk::DescriptorSet,
        binding: u32,
        first: usize,
        count: usize,
    },
}

/// Batches descriptor writes; the infos live in the writer until `update`
#[derive(Default)]
pub struct DescriptorSetWriter {
    pending: Vec<PendingWrite>,
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    image_infos: Vec<vk::DescriptorImageInfo>,
}

impl DescriptorSetWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a whole uniform buffer
    pub fn write_buffer(mut self, set: vk::DescriptorSet, binding: u32, buffer: vk::Buffer) -> Self {
        self.buffer_infos.push(vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range: vk::WHOLE_SIZE,
        });
        self.pending.push(PendingWrite::Buffer {
            set,
            binding,
            info: self.buffer_infos.len() - 1,
        });
        self
    }

    /// Bind one combined image sampler
    pub fn write_image(self, set: vk::DescriptorSet, binding: u32, image: vk::DescriptorImageInfo) -> Self {
        self.write_images(set, binding, &[image])
    }

    /// Bind an array of combined image samplers starting at element 0
    pub fn write_images(mut self, set: vk::DescriptorSet, binding: u32, images: &[vk::DescriptorImageInfo]) -> Self {
        if images.is_empty() {
            return self;
        }
        let first = self.image_infos.len();
        self.image_infos.extend_from_slice(images);
        self.pending.push(PendingWrite::Images {
            set,
            binding,
            first,
            count: images.len(),
        });
        self
    }

    /// Number of queued writes
    pub fn count(&self) -> usize {
        self.pending.len()
    }

    /// Apply every queued write
    pub fn update(self, device: &Device) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .pending
            .iter()
            .map(|pending| match *pending {
                PendingWrite::Buffer { set, binding, info } => vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(&self.buffer_infos[info]))
                    .build(),
                PendingWrite::Images {
                    set,
                    binding,
                    first,
                    count,
                } => vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&self.image_infos[first..first + count])
                    .build(),
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}

/// Every descriptor set layout the pipelines use
pub struct DescriptorLayouts {
    /// Set 0
    pub frame: DescriptorSetLayout,
    /// Set 2
    pub environment: DescriptorSetLayout,
    /// Set 1 of passes reading one image
    pub input1: DescriptorSetLayout,
    /// Set 1 of passes reading a color image and depth
    pub input2: DescriptorSetLayout,
    /// Set 1 of the light pass: gbuffer and depth
    pub input4: DescriptorSetLayout,
    materials: Vec<DescriptorSetLayout>,
}

impl DescriptorLayouts {
    /// Create every layout, including one material layout per map count
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let all = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
        let fragment = vk::ShaderStageFlags::FRAGMENT;

        let frame = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(frame_binding::CAMERA, all)
            .add_uniform_buffer(frame_binding::LIGHTS, fragment)
            .add_uniform_buffer(frame_binding::SHADOW, all)
            .add_combined_image_sampler(frame_binding::SHADOW_MAP, fragment)
            .add_combined_image_sampler(frame_binding::BRDF_LUT, fragment)
            .build(device)?;

        let environment = DescriptorSetLayoutBuilder::new()
            .add_combined_image_sampler(0, fragment)
            .add_combined_image_sampler(1, fragment)
            .add_combined_image_sampler(2, fragment)
            .build(device)?;

        let input = |count: u32| {
            (0..count)
                .fold(DescriptorSetLayoutBuilder::new(), |builder, binding| {
                    builder.add_combined_image_sampler(binding, fragment)
                })
                .build(device)
        };

        let materials = (0..=GraphicsLimits::MAX_MATERIAL_MAPS as u32)
            .map(|map_count| {
                let builder = DescriptorSetLayoutBuilder::new().add_uniform_buffer(MATERIAL_UNIFORM_BINDING, all);
                let builder = if map_count > 0 {
                    builder.add_combined_image_sampler_array(MATERIAL_MAPS_BINDING, map_count, fragment)
                } else {
                    builder
                };
                builder.build(device)
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Self {
            frame,
            environment,
            input1: input(1)?,
            input2: input(2)?,
            input4: input(4)?,
            materials,
        })
    }

    /// Material layout for a material binding `map_count` maps
    pub fn material(&self, map_count: u32) -> vk::DescriptorSetLayout {
        let index = (map_count as usize).min(self.materials.len() - 1);
        self.materials[index].handle()
    }
}
