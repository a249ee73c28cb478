//! Intermediate images of one viewport
//!
//! Images are allocated per [`ViewportLayout`] role. At creation every image
//! is moved into the layout the passes expect to find it in, and the output
//! is cleared to the configured color, so a viewport can be presented
//! before anything was rendered into it.

use ash::vk;

use super::descriptor_set::{DescriptorLayouts, DescriptorPool, DescriptorSetWriter};
use super::image::{transition_image, vk_format, GpuImage, ImageSpec, Transition};
use crate::foundation::math::Mat4;
use crate::graphics::error::RenderResult;
use crate::graphics::postprocess::PostSource;
use crate::graphics::viewport_layout::{TargetRole, ViewportLayout};
use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::rendering::render_pass::{Framebuffer, RenderPasses};
use crate::render::backends::vulkan::GpuDevice;

/// Samplers the input sets of a viewport use
#[derive(Debug, Clone, Copy)]
pub struct ViewportSamplers {
    /// Color images
    pub color: vk::Sampler,
    /// Depth
    pub depth: vk::Sampler,
}

/// Handles one view records against, copied out of its viewport
#[derive(Debug, Clone, Copy)]
pub struct ViewTargets {
    /// Size of every image
    pub extent: vk::Extent2D,
    /// Gbuffer colors and depth
    pub gbuffer: vk::Framebuffer,
    /// Light accumulation
    pub light: vk::Framebuffer,
    /// Forward image over the gbuffer depth
    pub forward: vk::Framebuffer,
    /// Ping-pong images
    pub post: [vk::Framebuffer; 2],
    /// Tone-mapped output
    pub fill: vk::Framebuffer,
    /// Gbuffer and depth, read by the light pass
    pub gbuffer_inputs: vk::DescriptorSet,
    /// Light buffer, read by composition and the skybox
    pub light_input: vk::DescriptorSet,
    sources: [vk::DescriptorSet; 3],
}

impl ViewTargets {
    /// A postprocess source and depth
    pub fn source_inputs(&self, source: PostSource) -> vk::DescriptorSet {
        match source {
            PostSource::Forward => self.sources[0],
            PostSource::Post(index) => self.sources[1 + index % 2],
        }
    }
}

/// Images, framebuffers and input sets of one viewport
pub struct VulkanViewport {
    layout: ViewportLayout,
    pool: vk::DescriptorPool,
    device: ash::Device,

    gbuffer_framebuffer: Framebuffer,
    light_framebuffer: Framebuffer,
    forward_framebuffer: Framebuffer,
    post_framebuffers: [Framebuffer; 2],
    fill_framebuffer: Framebuffer,

    gbuffer_inputs: vk::DescriptorSet,
    light_input: vk::DescriptorSet,
    source_inputs: [vk::DescriptorSet; 3],

    previous_view_projection: Option<Mat4>,
    images: Vec<(TargetRole, GpuImage)>,
}

fn usage(role: TargetRole) -> vk::ImageUsageFlags {
    match role {
        TargetRole::Depth => vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        TargetRole::Fill => {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
        }
        _ => vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
    }
}

impl VulkanViewport {
    /// Allocate every image of a `width`x`height` viewport
    pub fn new(
        gpu: &GpuDevice,
        command_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        passes: &RenderPasses,
        layouts: &DescriptorLayouts,
        samplers: ViewportSamplers,
        clear_color: [f32; 4],
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let layout = ViewportLayout::new(width, height);
        let images = layout
            .targets()
            .iter()
            .map(|target| {
                let spec = ImageSpec::flat(target.width, target.height, vk_format(target.format), usage(target.role));
                GpuImage::new(gpu, &spec).map(|image| (target.role, image))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let view = |role: TargetRole| {
            images
                .iter()
                .find(|(r, _)| *r == role)
                .map_or(vk::ImageView::null(), |(_, image)| image.view())
        };
        let extent = vk::Extent2D { width, height };
        let device = &gpu.device;

        let gbuffer_framebuffer = Framebuffer::new(
            device,
            &passes.gbuffer,
            &[
                view(TargetRole::AlbedoMetallic),
                view(TargetRole::NormalRoughness),
                view(TargetRole::EmissiveOcclusion),
                view(TargetRole::Depth),
            ],
            extent,
        )?;
        let light_framebuffer = Framebuffer::new(device, &passes.light, &[view(TargetRole::Light)], extent)?;
        let forward_framebuffer = Framebuffer::new(
            device,
            &passes.forward,
            &[view(TargetRole::Forward), view(TargetRole::Depth)],
            extent,
        )?;
        let post_framebuffers = [
            Framebuffer::new(device, &passes.post, &[view(TargetRole::PostA)], extent)?,
            Framebuffer::new(device, &passes.post, &[view(TargetRole::PostB)], extent)?,
        ];
        let fill_framebuffer = Framebuffer::new(device, &passes.fill, &[view(TargetRole::Fill)], extent)?;

        let color = |role: TargetRole| vk::DescriptorImageInfo {
            sampler: samplers.color,
            image_view: view(role),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        let depth = vk::DescriptorImageInfo {
            sampler: samplers.depth,
            image_view: view(TargetRole::Depth),
            image_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        };

        let gbuffer_inputs = descriptor_pool.allocate(layouts.input4.handle())?;
        let light_input = descriptor_pool.allocate(layouts.input1.handle())?;
        let source_inputs = [
            descriptor_pool.allocate(layouts.input2.handle())?,
            descriptor_pool.allocate(layouts.input2.handle())?,
            descriptor_pool.allocate(layouts.input2.handle())?,
        ];
        let mut writer = DescriptorSetWriter::new()
            .write_image(gbuffer_inputs, 0, color(TargetRole::AlbedoMetallic))
            .write_image(gbuffer_inputs, 1, color(TargetRole::NormalRoughness))
            .write_image(gbuffer_inputs, 2, color(TargetRole::EmissiveOcclusion))
            .write_image(gbuffer_inputs, 3, depth)
            .write_image(light_input, 0, color(TargetRole::Light));
        for (set, role) in source_inputs
            .iter()
            .zip([TargetRole::Forward, TargetRole::PostA, TargetRole::PostB])
        {
            writer = writer.write_image(*set, 0, color(role)).write_image(*set, 1, depth);
        }
        writer.update(device);

        command_pool.submit_and_wait(|command_buffer| {
            for (role, image) in &images {
                let range = image.full_range();
                match role {
                    TargetRole::Depth => {
                        transition_image(device, command_buffer, image.handle(), range, Transition::UNDEFINED_TO_DEPTH_READ);
                    }
                    TargetRole::Fill => {
                        transition_image(device, command_buffer, image.handle(), range, Transition::UNDEFINED_TO_TRANSFER_DST);
                        let clear = vk::ClearColorValue { float32: clear_color };
                        unsafe {
                            device.cmd_clear_color_image(
                                command_buffer,
                                image.handle(),
                                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                                &clear,
                                &[range],
                            );
                        }
                        transition_image(device, command_buffer, image.handle(), range, Transition::TRANSFER_DST_TO_SRC);
                    }
                    _ => {
                        transition_image(device, command_buffer, image.handle(), range, Transition::UNDEFINED_TO_SHADER_READ);
                    }
                }
            }
            Ok::<(), crate::graphics::error::RenderError>(())
        })?;

        log::debug!("Created viewport {}x{} with {} images", width, height, images.len());
        Ok(Self {
            layout,
            pool: descriptor_pool.handle(),
            device: gpu.device.clone(),
            gbuffer_framebuffer,
            light_framebuffer,
            forward_framebuffer,
            post_framebuffers,
            fill_framebuffer,
            gbuffer_inputs,
            light_input,
            source_inputs,
            previous_view_projection: None,
            images,
        })
    }

    /// Image roles and sizes
    pub fn layout(&self) -> &ViewportLayout {
        &self.layout
    }

    /// Size of every image
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.layout.width(),
            height: self.layout.height(),
        }
    }

    /// Image with `role`
    pub fn image(&self, role: TargetRole) -> Option<&GpuImage> {
        self.images.iter().find(|(r, _)| *r == role).map(|(_, image)| image)
    }

    /// Handles the passes of a view record against
    pub fn targets(&self) -> ViewTargets {
        ViewTargets {
            extent: self.extent(),
            gbuffer: self.gbuffer_framebuffer.handle(),
            light: self.light_framebuffer.handle(),
            forward: self.forward_framebuffer.handle(),
            post: [self.post_framebuffers[0].handle(), self.post_framebuffers[1].handle()],
            fill: self.fill_framebuffer.handle(),
            gbuffer_inputs: self.gbuffer_inputs,
            light_input: self.light_input,
            sources: self.source_inputs,
        }
    }

    /// View-projection the last view rendered here used
    pub fn previous_view_projection(&self) -> Option<&Mat4> {
        self.previous_view_projection.as_ref()
    }

    /// Remember this view's view-projection for the next frame
    pub fn set_previous_view_projection(&mut self, view_projection: Mat4) {
        self.previous_view_projection = Some(view_projection);
    }
}

impl Drop for VulkanViewport {
    fn drop(&mut self) {
        let sets = [
            self.gbuffer_inputs,
            self.light_input,
            self.source_inputs[0],
            self.source_inputs[1],
            self.source_inputs[2],
        ];
        unsafe {
            let _ = self.device.free_descriptor_sets(self.pool, &sets);
        }
    }
}
