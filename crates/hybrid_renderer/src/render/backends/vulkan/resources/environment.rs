//! Image based lighting maps
//!
//! An environment keeps its source cube and derives two more at creation:
//! a diffuse irradiance cube and a specular cube whose mips are prefiltered
//! for increasing roughness. Both are rendered face by face, following
//! [`BakePlan`], one blocking submission per draw. The BRDF table shared by
//! every environment is baked once when the backend starts.

use std::rc::Rc;

use ash::{vk, Device};

use super::descriptor_set::{DescriptorLayouts, DescriptorPool, DescriptorSetWriter};
use super::image::{GpuImage, ImageSpec, ImageView, Sampler};
use super::texture::VulkanTexture;
use crate::graphics::bake::{BakePlan, BakeTarget};
use crate::graphics::desc::{Filter, Wrap};
use crate::graphics::error::{RenderError, RenderResult};
use crate::graphics::uniforms::BakePush;
use crate::render::backends::vulkan::rendering::commands::{begin_render_pass, push_constants, CommandPool};
use crate::render::backends::vulkan::rendering::pipeline::PUSH_STAGES;
use crate::render::backends::vulkan::rendering::pipelines::FixedPipelines;
use crate::render::backends::vulkan::rendering::render_pass::{Framebuffer, RenderPasses, BAKE_FORMAT, LUT_FORMAT};
use crate::render::backends::vulkan::GpuDevice;

fn draw_fullscreen(device: &Device, command_buffer: vk::CommandBuffer) {
    unsafe {
        device.cmd_draw(command_buffer, 3, 1, 0, 0);
    }
}

/// A baked environment bound as set 2
pub struct VulkanEnvironment {
    device: Device,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
    _irradiance_sampler: Sampler,
    _prefilter_sampler: Sampler,
    _irradiance: GpuImage,
    _prefilter: GpuImage,
    _skybox: Rc<VulkanTexture>,
}

impl VulkanEnvironment {
    /// Bake the derived cubes of `skybox`, blocking until every draw finished
    pub fn bake(
        gpu: &GpuDevice,
        command_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        passes: &RenderPasses,
        layouts: &DescriptorLayouts,
        pipelines: &FixedPipelines,
        plan: &BakePlan,
        skybox: Rc<VulkanTexture>,
    ) -> RenderResult<Self> {
        let usage = vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED;
        let irradiance = GpuImage::new(gpu, &ImageSpec::cube(plan.irradiance_size(), BAKE_FORMAT, 1, usage))?;
        let prefilter = GpuImage::new(
            gpu,
            &ImageSpec::cube(plan.prefilter_size(), BAKE_FORMAT, plan.prefilter_mips(), usage),
        )?;

        // one view and framebuffer per step, alive until the submission completed
        let mut targets: Vec<(ImageView, Framebuffer)> = Vec::with_capacity(plan.steps().len());
        for step in plan.steps() {
            let image = match step.target {
                BakeTarget::Irradiance => &irradiance,
                BakeTarget::Prefilter => &prefilter,
            };
            let view = image.attachment_view(step.mip, step.face)?;
            let extent = vk::Extent2D {
                width: step.size,
                height: step.size,
            };
            let framebuffer = Framebuffer::new(&gpu.device, &passes.post, &[view.handle()], extent)?;
            targets.push((view, framebuffer));
        }

        let source = descriptor_pool.allocate(layouts.input1.handle())?;
        DescriptorSetWriter::new()
            .write_image(source, 0, skybox.descriptor())
            .update(&gpu.device);

        let device = &gpu.device;
        let source_size = skybox.desc().width as f32;
        // one submission per face and mip, each waited before the next
        let recorded = plan.steps().iter().zip(&targets).try_for_each(|(step, (_, framebuffer))| {
            command_pool.submit_and_wait(|command_buffer| {
                let pipeline = match step.target {
                    BakeTarget::Irradiance => &pipelines.irradiance,
                    BakeTarget::Prefilter => &pipelines.prefilter,
                };
                begin_render_pass(
                    device,
                    command_buffer,
                    passes.post.handle(),
                    framebuffer.handle(),
                    framebuffer.extent(),
                    &[],
                );
                unsafe {
                    device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
                    device.cmd_bind_descriptor_sets(
                        command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        pipeline.layout(),
                        0,
                        &[source],
                        &[],
                    );
                }
                let push = BakePush {
                    face: step.face,
                    roughness: step.roughness,
                    source_size,
                    _padding: 0.0,
                };
                push_constants(device, command_buffer, pipeline.layout(), PUSH_STAGES, &push);
                draw_fullscreen(device, command_buffer);
                unsafe {
                    device.cmd_end_render_pass(command_buffer);
                }
                Ok::<(), RenderError>(())
            })
        });
        descriptor_pool.free(&[source])?;
        recorded?;
        drop(targets);

        let irradiance_sampler = Sampler::linear_clamp(gpu)?;
        let prefilter_sampler = Sampler::new(gpu, Filter::Linear, Wrap::ClampToEdge, plan.prefilter_mips())?;
        let set = descriptor_pool.allocate(layouts.environment.handle())?;
        DescriptorSetWriter::new()
            .write_image(set, 0, skybox.descriptor())
            .write_image(
                set,
                1,
                vk::DescriptorImageInfo {
                    sampler: irradiance_sampler.handle(),
                    image_view: irradiance.view(),
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
            )
            .write_image(
                set,
                2,
                vk::DescriptorImageInfo {
                    sampler: prefilter_sampler.handle(),
                    image_view: prefilter.view(),
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
            )
            .update(device);

        log::info!("Baked environment with {} draws", plan.steps().len());
        Ok(Self {
            device: gpu.device.clone(),
            pool: descriptor_pool.handle(),
            set,
            _irradiance_sampler: irradiance_sampler,
            _prefilter_sampler: prefilter_sampler,
            _irradiance: irradiance,
            _prefilter: prefilter,
            _skybox: skybox,
        })
    }

    /// Set 2 of the pipelines that read the environment
    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }
}

impl Drop for VulkanEnvironment {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.free_descriptor_sets(self.pool, &[self.set]);
        }
    }
}

/// Split-sum BRDF integration table
pub struct BrdfLut {
    sampler: Sampler,
    image: GpuImage,
}

impl BrdfLut {
    /// Render the `size`x`size` table, blocking until done
    pub fn bake(
        gpu: &GpuDevice,
        command_pool: &CommandPool,
        passes: &RenderPasses,
        pipelines: &FixedPipelines,
        size: u32,
    ) -> RenderResult<Self> {
        let image = GpuImage::new(
            gpu,
            &ImageSpec::flat(
                size,
                size,
                LUT_FORMAT,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            ),
        )?;
        let framebuffer = Framebuffer::new(&gpu.device, &passes.lut, &[image.view()], image.extent())?;

        let device = &gpu.device;
        command_pool.submit_and_wait(|command_buffer| {
            begin_render_pass(
                device,
                command_buffer,
                passes.lut.handle(),
                framebuffer.handle(),
                framebuffer.extent(),
                &[],
            );
            unsafe {
                device.cmd_bind_pipeline(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipelines.brdf_lut.handle(),
                );
            }
            draw_fullscreen(device, command_buffer);
            unsafe {
                device.cmd_end_render_pass(command_buffer);
            }
            Ok::<(), RenderError>(())
        })?;

        log::debug!("Baked {size}x{size} BRDF table");
        Ok(Self {
            sampler: Sampler::linear_clamp(gpu)?,
            image,
        })
    }

    /// Descriptor for the frame set
    pub fn descriptor(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler.handle(),
            image_view: self.image.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}
