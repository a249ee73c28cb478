//! Render passes and framebuffers
//!
//! Every pass has a single subpass. Attachments leave the pass in the layout
//! the next consumer samples them in, so no pass needs explicit image
//! barriers: color targets end shader-readable, depth ends read-only and the
//! viewport output ends as a blit source.

use ash::{vk, Device};

use crate::graphics::viewport_layout::{TargetRole, ViewportLayout};
use crate::render::backends::vulkan::resources::image::vk_format;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Format of the cascaded shadow map
pub const SHADOW_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
/// Format of the baked environment cubes
pub const BAKE_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
/// Format of the BRDF lookup table
pub const LUT_FORMAT: vk::Format = vk::Format::R16G16_SFLOAT;

/// One attachment of a render pass
#[derive(Debug, Clone, Copy)]
pub struct AttachmentSpec {
    /// Texel format
    pub format: vk::Format,
    /// What happens to the contents on load
    pub load_op: vk::AttachmentLoadOp,
    /// Layout the image is in when the pass begins
    pub initial_layout: vk::ImageLayout,
    /// Layout inside the subpass
    pub layout: vk::ImageLayout,
    /// Layout the image is left in
    pub final_layout: vk::ImageLayout,
}

impl AttachmentSpec {
    /// Color target written in full or cleared, sampled afterwards
    pub fn color(format: vk::Format, load_op: vk::AttachmentLoadOp) -> Self {
        Self {
            format,
            load_op,
            initial_layout: vk::ImageLayout::UNDEFINED,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            final_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Depth cleared at the start, read-only afterwards
    pub fn depth_clear(format: vk::Format) -> Self {
        Self {
            format,
            load_op: vk::AttachmentLoadOp::CLEAR,
            initial_layout: vk::ImageLayout::UNDEFINED,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        }
    }

    /// Depth written by an earlier pass and tested against here
    pub fn depth_load(format: vk::Format) -> Self {
        Self {
            format,
            load_op: vk::AttachmentLoadOp::LOAD,
            initial_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        }
    }

    /// Same attachment left in `layout`
    pub fn ending_in(mut self, layout: vk::ImageLayout) -> Self {
        self.final_layout = layout;
        self
    }

    fn describe(&self) -> vk::AttachmentDescription {
        vk::AttachmentDescription::builder()
            .format(self.format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(self.load_op)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(self.initial_layout)
            .final_layout(self.final_layout)
            .build()
    }
}

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
    color_count: u32,
}

impl RenderPass {
    /// Single-subpass pass writing `colors` and optionally `depth`
    pub fn new(device: &Device, colors: &[AttachmentSpec], depth: Option<AttachmentSpec>) -> VulkanResult<Self> {
        let attachments: Vec<vk::AttachmentDescription> =
            colors.iter().chain(depth.iter()).map(AttachmentSpec::describe).collect();

        let color_refs: Vec<vk::AttachmentReference> = colors
            .iter()
            .enumerate()
            .map(|(i, spec)| vk::AttachmentReference {
                attachment: i as u32,
                layout: spec.layout,
            })
            .collect();
        let depth_ref = depth.map(|spec| vk::AttachmentReference {
            attachment: colors.len() as u32,
            layout: spec.layout,
        });

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        let subpasses = [subpass.build()];

        // Passes follow each other in one command buffer, reading what the previous one wrote
        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
            | vk::PipelineStageFlags::FRAGMENT_SHADER
            | vk::PipelineStageFlags::TRANSFER;
        let accesses = vk::AccessFlags::SHADER_READ
            | vk::AccessFlags::TRANSFER_READ
            | vk::AccessFlags::TRANSFER_WRITE
            | vk::AccessFlags::COLOR_ATTACHMENT_READ
            | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
        let dependencies = [
            vk::SubpassDependency::builder()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(stages)
                .src_access_mask(accesses)
                .dst_stage_mask(stages)
                .dst_access_mask(accesses)
                .build(),
            vk::SubpassDependency::builder()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(stages)
                .src_access_mask(accesses)
                .dst_stage_mask(stages)
                .dst_access_mask(accesses)
                .build(),
        ];

        let render_pass_create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            device
                .create_render_pass(&render_pass_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.clone(),
            render_pass,
            color_count: colors.len() as u32,
        })
    }

    /// Get the render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Number of color attachments, the blend state count of its pipelines
    pub fn color_count(&self) -> u32 {
        self.color_count
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// Create a new framebuffer
    pub fn new(
        device: &Device,
        render_pass: &RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let framebuffer_create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass.handle())
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&framebuffer_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.clone(),
            framebuffer,
            extent,
        })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// Size of the attachments
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

fn role_format(role: TargetRole) -> vk::Format {
    ViewportLayout::ROLES
        .iter()
        .find(|(r, _)| *r == role)
        .map_or(vk::Format::UNDEFINED, |(_, format)| vk_format(*format))
}

/// Every render pass the backend records
pub struct RenderPasses {
    /// Gbuffer colors and depth, cleared
    pub gbuffer: RenderPass,
    /// Light accumulation, cleared
    pub light: RenderPass,
    /// Composition, skybox and forward geometry over the gbuffer depth
    pub forward: RenderPass,
    /// One postprocess step or one bake face; the whole target is overwritten
    pub post: RenderPass,
    /// Tonemap into the viewport output
    pub fill: RenderPass,
    /// One shadow cascade
    pub shadow: RenderPass,
    /// BRDF lookup table
    pub lut: RenderPass,
}

impl RenderPasses {
    /// Create every pass
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let clear = vk::AttachmentLoadOp::CLEAR;
        let hdr = role_format(TargetRole::Light);
        let depth = role_format(TargetRole::Depth);

        let gbuffer_colors = [
            AttachmentSpec::color(role_format(TargetRole::AlbedoMetallic), clear),
            AttachmentSpec::color(role_format(TargetRole::NormalRoughness), clear),
            AttachmentSpec::color(role_format(TargetRole::EmissiveOcclusion), clear),
        ];

        Ok(Self {
            gbuffer: RenderPass::new(device, &gbuffer_colors, Some(AttachmentSpec::depth_clear(depth)))?,
            light: RenderPass::new(device, &[AttachmentSpec::color(hdr, clear)], None)?,
            forward: RenderPass::new(
                device,
                &[AttachmentSpec::color(role_format(TargetRole::Forward), clear)],
                Some(AttachmentSpec::depth_load(depth)),
            )?,
            post: RenderPass::new(
                device,
                &[AttachmentSpec::color(BAKE_FORMAT, vk::AttachmentLoadOp::DONT_CARE)],
                None,
            )?,
            fill: RenderPass::new(
                device,
                &[AttachmentSpec::color(role_format(TargetRole::Fill), vk::AttachmentLoadOp::DONT_CARE)
                    .ending_in(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)],
                None,
            )?,
            shadow: RenderPass::new(device, &[], Some(AttachmentSpec::depth_clear(SHADOW_FORMAT)))?,
            lut: RenderPass::new(
                device,
                &[AttachmentSpec::color(LUT_FORMAT, vk::AttachmentLoadOp::DONT_CARE)],
                None,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_formats_resolve() {
        assert_eq!(role_format(TargetRole::Depth), vk::Format::D32_SFLOAT);
        assert_eq!(role_format(TargetRole::Light), BAKE_FORMAT);
        assert_eq!(role_format(TargetRole::Fill), vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn test_depth_load_keeps_contents() {
        let spec = AttachmentSpec::depth_load(SHADOW_FORMAT);
        assert_eq!(spec.load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(spec.initial_layout, vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL);
        let fill = AttachmentSpec::color(LUT_FORMAT, vk::AttachmentLoadOp::DONT_CARE)
            .ending_in(vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        assert_eq!(fill.final_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    }
}
