//! Images, views and layout transitions

use ash::{vk, Device};

use crate::graphics::desc::{Filter, PixelFormat, Wrap};
use crate::render::backends::vulkan::resources::buffer::find_memory_type;
use crate::render::backends::vulkan::{GpuDevice, VulkanError, VulkanResult};

/// Shape of an image to allocate
#[derive(Debug, Clone, Copy)]
pub struct ImageSpec {
    /// Width of mip 0
    pub width: u32,
    /// Height of mip 0
    pub height: u32,
    /// Texel format
    pub format: vk::Format,
    /// Mip levels
    pub mip_levels: u32,
    /// Array layers, 6 for cubes
    pub layers: u32,
    /// Cube compatible
    pub cube: bool,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
}

impl ImageSpec {
    /// Single-level 2D image
    pub fn flat(width: u32, height: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            width,
            height,
            format,
            mip_levels: 1,
            layers: 1,
            cube: false,
            usage,
        }
    }

    /// Cube with `mip_levels` levels
    pub fn cube(size: u32, format: vk::Format, mip_levels: u32, usage: vk::ImageUsageFlags) -> Self {
        Self {
            width: size,
            height: size,
            format,
            mip_levels,
            layers: 6,
            cube: true,
            usage,
        }
    }

    /// Same shape with a different level count
    pub fn with_mips(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// Same shape as an array of `layers`
    pub fn with_layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    /// Aspect implied by the format
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        aspect_of(self.format)
    }
}

/// Image view with automatic cleanup
pub struct ImageView {
    device: Device,
    view: vk::ImageView,
}

impl ImageView {
    /// Get the view handle
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

/// Device-local image with its memory and a view over every level and layer
pub struct GpuImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    spec: ImageSpec,
}

impl GpuImage {
    /// Allocate an image described by `spec`
    pub fn new(gpu: &GpuDevice, spec: &ImageSpec) -> VulkanResult<Self> {
        let device = gpu.device.clone();
        let flags = if spec.cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        let image_create_info = vk::ImageCreateInfo::builder()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: spec.width,
                height: spec.height,
                depth: 1,
            })
            .mip_levels(spec.mip_levels)
            .array_layers(spec.layers)
            .format(spec.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(spec.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe { device.create_image(&image_create_info, None).map_err(VulkanError::Api)? };

        let memory_requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = find_memory_type(
            &gpu.memory_properties,
            memory_requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .and_then(|memory_type_index| {
            let memory_allocate_info = vk::MemoryAllocateInfo::builder()
                .allocation_size(memory_requirements.size)
                .memory_type_index(memory_type_index);
            unsafe { device.allocate_memory(&memory_allocate_info, None) }.map_err(VulkanError::Api)
        });
        let memory = match memory {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let mut created = Self {
            device,
            image,
            memory,
            view: vk::ImageView::null(),
            spec: *spec,
        };
        unsafe {
            created
                .device
                .bind_image_memory(image, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        let view_type = if spec.cube {
            vk::ImageViewType::CUBE
        } else if spec.layers > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        };
        created.view = created.raw_view(view_type, 0, spec.mip_levels, 0, spec.layers)?;
        Ok(created)
    }

    fn raw_view(
        &self,
        view_type: vk::ImageViewType,
        base_mip: u32,
        mip_count: u32,
        base_layer: u32,
        layer_count: u32,
    ) -> VulkanResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(self.image)
            .view_type(view_type)
            .format(self.spec.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.spec.aspect(),
                base_mip_level: base_mip,
                level_count: mip_count,
                base_array_layer: base_layer,
                layer_count,
            });
        unsafe { self.device.create_image_view(&create_info, None).map_err(VulkanError::Api) }
    }

    /// 2D view of a single level and layer, for rendering into it
    pub fn attachment_view(&self, mip: u32, layer: u32) -> VulkanResult<ImageView> {
        Ok(ImageView {
            device: self.device.clone(),
            view: self.raw_view(vk::ImageViewType::TYPE_2D, mip, 1, layer, 1)?,
        })
    }

    /// Get the image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View over every level and layer
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Shape of the image
    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }

    /// Size of mip 0
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.spec.width,
            height: self.spec.height,
        }
    }

    /// Range covering every level and layer
    pub fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.spec.aspect(),
            base_mip_level: 0,
            level_count: self.spec.mip_levels,
            base_array_layer: 0,
            layer_count: self.spec.layers,
        }
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.destroy_image_view(self.view, None);
            }
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// One layout transition with explicit stages and accesses
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    /// Layout before
    pub old_layout: vk::ImageLayout,
    /// Layout after
    pub new_layout: vk::ImageLayout,
    /// Stages that must finish first
    pub src_stage: vk::PipelineStageFlags,
    /// Writes to make available
    pub src_access: vk::AccessFlags,
    /// Stages that wait
    pub dst_stage: vk::PipelineStageFlags,
    /// Accesses to make visible
    pub dst_access: vk::AccessFlags,
}

impl Transition {
    /// Discard contents and prepare for a transfer write
    pub const UNDEFINED_TO_TRANSFER_DST: Self = Self {
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
        src_access: vk::AccessFlags::empty(),
        dst_stage: vk::PipelineStageFlags::TRANSFER,
        dst_access: vk::AccessFlags::TRANSFER_WRITE,
    };

    /// Make sampled contents writable by a transfer
    pub const SHADER_READ_TO_TRANSFER_DST: Self = Self {
        old_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        src_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        src_access: vk::AccessFlags::SHADER_READ,
        dst_stage: vk::PipelineStageFlags::TRANSFER,
        dst_access: vk::AccessFlags::TRANSFER_WRITE,
    };

    /// Finished transfer write becomes a blit source
    pub const TRANSFER_DST_TO_SRC: Self = Self {
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        src_stage: vk::PipelineStageFlags::TRANSFER,
        src_access: vk::AccessFlags::TRANSFER_WRITE,
        dst_stage: vk::PipelineStageFlags::TRANSFER,
        dst_access: vk::AccessFlags::TRANSFER_READ,
    };

    /// Finished transfer write becomes sampleable
    pub const TRANSFER_DST_TO_SHADER_READ: Self = Self {
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        src_stage: vk::PipelineStageFlags::TRANSFER,
        src_access: vk::AccessFlags::TRANSFER_WRITE,
        dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        dst_access: vk::AccessFlags::SHADER_READ,
    };

    /// Blit source becomes sampleable
    pub const TRANSFER_SRC_TO_SHADER_READ: Self = Self {
        old_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        src_stage: vk::PipelineStageFlags::TRANSFER,
        src_access: vk::AccessFlags::TRANSFER_READ,
        dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        dst_access: vk::AccessFlags::SHADER_READ,
    };

    /// Fresh image becomes sampleable without contents
    pub const UNDEFINED_TO_SHADER_READ: Self = Self {
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
        src_access: vk::AccessFlags::empty(),
        dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        dst_access: vk::AccessFlags::SHADER_READ,
    };

    /// Blit destination handed to the presentation engine
    pub const TRANSFER_DST_TO_PRESENT: Self = Self {
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        src_stage: vk::PipelineStageFlags::TRANSFER,
        src_access: vk::AccessFlags::TRANSFER_WRITE,
        dst_stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        dst_access: vk::AccessFlags::empty(),
    };

    /// Fresh depth image becomes a read-only depth texture
    pub const UNDEFINED_TO_DEPTH_READ: Self = Self {
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
        src_access: vk::AccessFlags::empty(),
        dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        dst_access: vk::AccessFlags::SHADER_READ,
    };
}

/// Record a layout transition of `range`
pub fn transition_image(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    transition: Transition,
) {
    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(transition.old_layout)
        .new_layout(transition.new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(transition.src_access)
        .dst_access_mask(transition.dst_access);

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            transition.src_stage,
            transition.dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier.build()],
        );
    }
}

/// Range of one level across `layers` layers
pub fn mip_range(aspect: vk::ImageAspectFlags, mip: u32, layers: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: mip,
        level_count: 1,
        base_array_layer: 0,
        layer_count: layers,
    }
}

/// Aspect of a Vulkan format
pub fn aspect_of(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT | vk::Format::D16_UNORM => vk::ImageAspectFlags::DEPTH,
        vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Vulkan format of a pixel format
pub fn vk_format(format: PixelFormat) -> vk::Format {
    match format {
        PixelFormat::R8 => vk::Format::R8_UNORM,
        PixelFormat::Rg8 => vk::Format::R8G8_UNORM,
        PixelFormat::Rgba8 => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::Rg16F => vk::Format::R16G16_SFLOAT,
        PixelFormat::Rgba16F => vk::Format::R16G16B16A16_SFLOAT,
        PixelFormat::Rgba32F => vk::Format::R32G32B32A32_SFLOAT,
        PixelFormat::Bc1 => vk::Format::BC1_RGBA_UNORM_BLOCK,
        PixelFormat::Bc3 => vk::Format::BC3_UNORM_BLOCK,
        PixelFormat::D24S8 => vk::Format::D24_UNORM_S8_UINT,
        PixelFormat::D32 => vk::Format::D32_SFLOAT,
    }
}

/// Vulkan filter of a texture filter
pub fn vk_filter(filter: Filter) -> (vk::Filter, vk::SamplerMipmapMode) {
    match filter {
        Filter::Nearest => (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST),
        Filter::Linear => (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR),
    }
}

/// Vulkan address mode of a wrap mode
pub fn vk_wrap(wrap: Wrap) -> vk::SamplerAddressMode {
    match wrap {
        Wrap::Repeat => vk::SamplerAddressMode::REPEAT,
        Wrap::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        Wrap::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
    }
}

/// Sampler wrapper with automatic cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Sampler with the given filter and wrap; anisotropy only for linear filtering
    pub fn new(gpu: &GpuDevice, filter: Filter, wrap: Wrap, mip_levels: u32) -> VulkanResult<Self> {
        let (texel_filter, mipmap_mode) = vk_filter(filter);
        let address_mode = vk_wrap(wrap);
        let anisotropy = filter == Filter::Linear && mip_levels > 1;
        let max_anisotropy = 16.0_f32.min(gpu.limits.max_sampler_anisotropy);

        let sampler_create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(texel_filter)
            .min_filter(texel_filter)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(if anisotropy { max_anisotropy } else { 1.0 })
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(mipmap_mode)
            .min_lod(0.0)
            .max_lod(mip_levels as f32);

        Self::from_info(gpu, &sampler_create_info)
    }

    /// Clamped linear sampler for render targets
    pub fn linear_clamp(gpu: &GpuDevice) -> VulkanResult<Self> {
        Self::new(gpu, Filter::Linear, Wrap::ClampToEdge, 1)
    }

    /// Depth comparison sampler for shadow maps
    pub fn shadow(gpu: &GpuDevice) -> VulkanResult<Self> {
        let sampler_create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .compare_enable(true)
            .compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .max_lod(0.0);

        Self::from_info(gpu, &sampler_create_info)
    }

    fn from_info(gpu: &GpuDevice, info: &vk::SamplerCreateInfo) -> VulkanResult<Self> {
        let sampler = unsafe { gpu.device.create_sampler(info, None).map_err(VulkanError::Api)? };
        Ok(Self {
            device: gpu.device.clone(),
            sampler,
        })
    }

    /// Get the sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_formats_use_depth_aspect() {
        assert_eq!(aspect_of(vk_format(PixelFormat::D32)), vk::ImageAspectFlags::DEPTH);
        assert!(aspect_of(vk_format(PixelFormat::D24S8)).contains(vk::ImageAspectFlags::STENCIL));
        assert_eq!(aspect_of(vk_format(PixelFormat::Rgba16F)), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_srgb_output_keeps_srgb_encoding() {
        assert_eq!(vk_format(PixelFormat::Rgba8Srgb), vk::Format::R8G8B8A8_SRGB);
        assert_eq!(vk_wrap(Wrap::ClampToEdge), vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(vk_filter(Filter::Nearest).0, vk::Filter::NEAREST);
    }
}
