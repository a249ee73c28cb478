//! Cascaded shadow map
//!
//! One depth array with a layer per cascade. Each layer has its own view and
//! framebuffer; shaders sample the whole array through a comparison sampler.

use ash::vk;

use super::image::{transition_image, GpuImage, ImageSpec, ImageView, Sampler, Transition};
use crate::graphics::error::RenderResult;
use crate::graphics::limits::GraphicsLimits;
use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::rendering::render_pass::{Framebuffer, RenderPass, SHADOW_FORMAT};
use crate::render::backends::vulkan::GpuDevice;

/// Depth array rendered by the shadow passes
pub struct ShadowMap {
    framebuffers: Vec<Framebuffer>,
    _layer_views: Vec<ImageView>,
    sampler: Sampler,
    image: GpuImage,
}

impl ShadowMap {
    /// Allocate `size`x`size` layers and leave them readable
    pub fn new(gpu: &GpuDevice, pool: &CommandPool, render_pass: &RenderPass, size: u32) -> RenderResult<Self> {
        let spec = ImageSpec::flat(
            size,
            size,
            SHADOW_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        )
        .with_layers(GraphicsLimits::MAX_SHADOW_CASCADES);
        let image = GpuImage::new(gpu, &spec)?;

        let layer_views = (0..GraphicsLimits::MAX_SHADOW_CASCADES)
            .map(|layer| image.attachment_view(0, layer))
            .collect::<Result<Vec<_>, _>>()?;
        let framebuffers = layer_views
            .iter()
            .map(|view| Framebuffer::new(&gpu.device, render_pass, &[view.handle()], image.extent()))
            .collect::<Result<Vec<_>, _>>()?;

        // cascades that are never rendered still have to be sampleable
        pool.submit_and_wait(|command_buffer| {
            transition_image(
                &gpu.device,
                command_buffer,
                image.handle(),
                image.full_range(),
                Transition::UNDEFINED_TO_DEPTH_READ,
            );
            Ok::<(), crate::graphics::error::RenderError>(())
        })?;

        log::debug!(
            "Created {} shadow cascades of {}x{}",
            GraphicsLimits::MAX_SHADOW_CASCADES,
            size,
            size
        );
        Ok(Self {
            framebuffers,
            _layer_views: layer_views,
            sampler: Sampler::shadow(gpu)?,
            image,
        })
    }

    /// Framebuffer of one cascade
    pub fn framebuffer(&self, cascade: u32) -> &Framebuffer {
        &self.framebuffers[cascade as usize]
    }

    /// Layer size
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }

    /// Descriptor of the whole array with the comparison sampler
    pub fn descriptor(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler.handle(),
            image_view: self.image.view(),
            image_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        }
    }
}
