//! Sampled textures
//!
//! Pixel data goes through a staging buffer, the mip chain is generated by
//! successive blits, and the image ends in `SHADER_READ_ONLY_OPTIMAL`.
//! Textures created without pixels are cleared to zero.

use ash::vk;

use super::buffer::Buffer;
use super::image::{mip_range, transition_image, vk_format, GpuImage, ImageSpec, Sampler, Transition};
use crate::graphics::desc::{TextureDesc, TextureKind, TextureRegion};
use crate::graphics::error::RenderResult;
use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::GpuDevice;

/// A texture living on the GPU
pub struct VulkanTexture {
    image: GpuImage,
    sampler: Sampler,
    desc: TextureDesc,
}

impl VulkanTexture {
    /// Create and upload a validated description
    pub fn new(gpu: &GpuDevice, pool: &CommandPool, desc: &TextureDesc) -> RenderResult<Self> {
        let format = vk_format(desc.format);
        let mut usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST;
        if desc.mip_levels > 1 {
            usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }
        if desc.is_render_target {
            usage |= if desc.format.is_depth() {
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::ImageUsageFlags::COLOR_ATTACHMENT
            };
        }

        let spec = ImageSpec {
            width: desc.width,
            height: desc.height,
            format,
            mip_levels: desc.mip_levels,
            layers: desc.kind.layers(),
            cube: desc.kind == TextureKind::Cube,
            usage,
        };
        let image = GpuImage::new(gpu, &spec)?;
        let sampler = Sampler::new(gpu, desc.filter, desc.wrap, desc.mip_levels)?;

        let mut stored = desc.clone();
        stored.pixels = Vec::new();
        let texture = Self {
            image,
            sampler,
            desc: stored,
        };

        if desc.pixels.is_empty() {
            texture.clear(gpu, pool)?;
        } else {
            texture.upload(gpu, pool, &desc.pixels)?;
        }
        log::debug!(
            "Created {:?} texture {}x{} {:?} with {} mip(s)",
            desc.kind,
            desc.width,
            desc.height,
            desc.format,
            desc.mip_levels
        );
        Ok(texture)
    }

    fn upload(&self, gpu: &GpuDevice, pool: &CommandPool, pixels: &[u8]) -> RenderResult<()> {
        let staging = Buffer::staging(gpu, pixels)?;
        let image = self.image.handle();
        let aspect = self.image.spec().aspect();
        let layers = self.image.spec().layers;
        let device = &gpu.device;

        pool.submit_and_wait(|command_buffer| {
            transition_image(
                device,
                command_buffer,
                image,
                self.image.full_range(),
                Transition::UNDEFINED_TO_TRANSFER_DST,
            );

            // layers are tightly packed one after another
            let region = vk::BufferImageCopy::builder()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: aspect,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: layers,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width: self.desc.width,
                    height: self.desc.height,
                    depth: 1,
                });
            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    staging.handle(),
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region.build()],
                );
            }

            self.finish_levels(gpu, command_buffer);
            Ok(())
        })
    }

    fn clear(&self, gpu: &GpuDevice, pool: &CommandPool) -> RenderResult<()> {
        let image = self.image.handle();
        let range = self.image.full_range();
        let device = &gpu.device;

        pool.submit_and_wait(|command_buffer| {
            if self.desc.format.is_compressed() {
                transition_image(device, command_buffer, image, range, Transition::UNDEFINED_TO_SHADER_READ);
                return Ok(());
            }

            transition_image(device, command_buffer, image, range, Transition::UNDEFINED_TO_TRANSFER_DST);
            unsafe {
                if self.desc.format.is_depth() {
                    let clear = vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 };
                    device.cmd_clear_depth_stencil_image(
                        command_buffer,
                        image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &clear,
                        &[range],
                    );
                } else {
                    let clear = vk::ClearColorValue { float32: [0.0; 4] };
                    device.cmd_clear_color_image(
                        command_buffer,
                        image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &clear,
                        &[range],
                    );
                }
            }
            transition_image(device, command_buffer, image, range, Transition::TRANSFER_DST_TO_SHADER_READ);
            Ok(())
        })
    }

    /// Overwrite `region` of the base level of layer 0 and rebuild the mip chain
    ///
    /// The caller has already checked the update against the description.
    /// Blocks until the copy finished.
    pub fn update(&self, gpu: &GpuDevice, pool: &CommandPool, pixels: &[u8], region: TextureRegion) -> RenderResult<()> {
        let needed = self.desc.format.image_bytes(region.width, region.height);
        let staging = Buffer::staging(gpu, &pixels[..needed])?;
        let image = self.image.handle();
        let aspect = self.image.spec().aspect();
        let device = &gpu.device;

        pool.submit_and_wait(|command_buffer| {
            transition_image(
                device,
                command_buffer,
                image,
                self.image.full_range(),
                Transition::SHADER_READ_TO_TRANSFER_DST,
            );

            let copy = vk::BufferImageCopy::builder()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: aspect,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D {
                    x: region.x as i32,
                    y: region.y as i32,
                    z: 0,
                })
                .image_extent(vk::Extent3D {
                    width: region.width,
                    height: region.height,
                    depth: 1,
                });
            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    staging.handle(),
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[copy.build()],
                );
            }

            self.finish_levels(gpu, command_buffer);
            Ok(())
        })
    }

    /// With every level in `TRANSFER_DST`, blit the chain down and leave all levels shader-readable
    fn finish_levels(&self, gpu: &GpuDevice, command_buffer: vk::CommandBuffer) {
        let device = &gpu.device;
        let image = self.image.handle();
        let spec = *self.image.spec();
        let aspect = spec.aspect();

        let mut mip_width = spec.width as i32;
        let mut mip_height = spec.height as i32;

        for level in 1..spec.mip_levels {
            transition_image(
                device,
                command_buffer,
                image,
                mip_range(aspect, level - 1, spec.layers),
                Transition::TRANSFER_DST_TO_SRC,
            );

            let next_width = (mip_width / 2).max(1);
            let next_height = (mip_height / 2).max(1);

            let blit = vk::ImageBlit::builder()
                .src_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: mip_width,
                        y: mip_height,
                        z: 1,
                    },
                ])
                .src_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: aspect,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count: spec.layers,
                })
                .dst_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: next_width,
                        y: next_height,
                        z: 1,
                    },
                ])
                .dst_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: aspect,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count: spec.layers,
                });

            unsafe {
                device.cmd_blit_image(
                    command_buffer,
                    image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit.build()],
                    vk::Filter::LINEAR,
                );
            }

            transition_image(
                device,
                command_buffer,
                image,
                mip_range(aspect, level - 1, spec.layers),
                Transition::TRANSFER_SRC_TO_SHADER_READ,
            );

            mip_width = next_width;
            mip_height = next_height;
        }

        transition_image(
            device,
            command_buffer,
            image,
            mip_range(aspect, spec.mip_levels - 1, spec.layers),
            Transition::TRANSFER_DST_TO_SHADER_READ,
        );
    }

    /// Description the texture was created from, without pixels
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    /// View over every level and layer
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Sampler matching the description
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    /// Descriptor info for binding as a combined image sampler
    pub fn descriptor(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler.handle(),
            image_view: self.image.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}
