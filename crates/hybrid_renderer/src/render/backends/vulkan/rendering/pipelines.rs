//! The renderer's pipelines
//!
//! Fixed pipelines are built once at startup. Material pipelines are built on
//! first use and memoized by their structured key.

use ash::{vk, Device};

use super::pipeline::{BlendMode, DepthMode, GraphicsPipeline, PipelineDesc};
use super::render_pass::{RenderPass, RenderPasses};
use super::shader::ShaderLibrary;
use crate::graphics::error::RenderResult;
use crate::graphics::material_layout::MaterialLayout;
use crate::graphics::pipeline_key::{ForwardPipelineKey, GBufferPipelineKey, PipelineCache};
use crate::graphics::uniforms::{BakePush, LightPush, ObjectPush, PostPush, ShadowPush};
use crate::render::backends::vulkan::resources::descriptor_set::DescriptorLayouts;

/// Pipelines that do not depend on a material
pub struct FixedPipelines {
    /// Caster depth into one cascade
    pub shadow: GraphicsPipeline,
    /// Image based ambient light
    pub light_ambient: GraphicsPipeline,
    /// One directional light
    pub light_directional: GraphicsPipeline,
    /// One point light
    pub light_point: GraphicsPipeline,
    /// Light buffer into the forward image
    pub compose: GraphicsPipeline,
    /// Environment behind everything
    pub skybox: GraphicsPipeline,
    /// Antialiasing
    pub fxaa: GraphicsPipeline,
    /// Unsharp mask
    pub sharpen: GraphicsPipeline,
    /// Camera motion blur
    pub motion_blur: GraphicsPipeline,
    /// Separable-free box blur
    pub blur: GraphicsPipeline,
    /// Depth discontinuity outline
    pub outline: GraphicsPipeline,
    /// Exposure and tone curve into the viewport output
    pub tonemap: GraphicsPipeline,
    /// Diffuse irradiance convolution
    pub irradiance: GraphicsPipeline,
    /// Specular prefilter
    pub prefilter: GraphicsPipeline,
    /// Split-sum BRDF table
    pub brdf_lut: GraphicsPipeline,
}

impl FixedPipelines {
    /// Load the shaders and build every fixed pipeline
    pub fn new(
        device: &Device,
        library: &ShaderLibrary,
        passes: &RenderPasses,
        layouts: &DescriptorLayouts,
    ) -> RenderResult<Self> {
        let frame = layouts.frame.handle();
        let environment = layouts.environment.handle();
        let input1 = layouts.input1.handle();
        let input2 = layouts.input2.handle();
        let input4 = layouts.input4.handle();

        let fullscreen = library.load(device, "fullscreen.vert")?;
        let shadow_vertex = library.load(device, "shadow.vert")?;

        let light = |name: &str| -> RenderResult<GraphicsPipeline> {
            let fragment = library.load(device, name)?;
            let desc = PipelineDesc::fullscreen(&fullscreen, &fragment)
                .blend(BlendMode::Additive)
                .set_layouts(&[frame, input4, environment])
                .push::<LightPush>();
            Ok(GraphicsPipeline::new(device, &passes.light, &desc)?)
        };
        let effect = |name: &str, pass: &RenderPass| -> RenderResult<GraphicsPipeline> {
            let fragment = library.load(device, name)?;
            let desc = PipelineDesc::fullscreen(&fullscreen, &fragment)
                .set_layouts(&[frame, input2])
                .push::<PostPush>();
            Ok(GraphicsPipeline::new(device, pass, &desc)?)
        };
        let bake = |name: &str| -> RenderResult<GraphicsPipeline> {
            let fragment = library.load(device, name)?;
            let desc = PipelineDesc::fullscreen(&fullscreen, &fragment)
                .set_layouts(&[input1])
                .push::<BakePush>();
            Ok(GraphicsPipeline::new(device, &passes.post, &desc)?)
        };

        let shadow = GraphicsPipeline::new(
            device,
            &passes.shadow,
            &PipelineDesc::mesh(&shadow_vertex, None)
                .cull(vk::CullModeFlags::NONE)
                .depth_bias(1.25, 1.75)
                .push::<ShadowPush>(),
        )?;

        let compose_fragment = library.load(device, "compose.frag")?;
        let compose = GraphicsPipeline::new(
            device,
            &passes.forward,
            &PipelineDesc::fullscreen(&fullscreen, &compose_fragment).set_layouts(&[frame, input1]),
        )?;

        let skybox_fragment = library.load(device, "skybox.frag")?;
        let skybox = GraphicsPipeline::new(
            device,
            &passes.forward,
            &PipelineDesc::fullscreen(&fullscreen, &skybox_fragment)
                .depth(DepthMode::Test(vk::CompareOp::LESS_OR_EQUAL))
                .set_layouts(&[frame, input1, environment]),
        )?;

        let lut_fragment = library.load(device, "brdf_lut.frag")?;
        let brdf_lut = GraphicsPipeline::new(
            device,
            &passes.lut,
            &PipelineDesc::fullscreen(&fullscreen, &lut_fragment),
        )?;

        log::debug!("Built fixed pipelines");
        Ok(Self {
            shadow,
            light_ambient: light("light_ambient.frag")?,
            light_directional: light("light_directional.frag")?,
            light_point: light("light_point.frag")?,
            compose,
            skybox,
            fxaa: effect("fxaa.frag", &passes.post)?,
            sharpen: effect("sharpen.frag", &passes.post)?,
            motion_blur: effect("motion_blur.frag", &passes.post)?,
            blur: effect("blur.frag", &passes.post)?,
            outline: effect("outline.frag", &passes.post)?,
            tonemap: effect("tonemap.frag", &passes.fill)?,
            irradiance: bake("irradiance.frag")?,
            prefilter: bake("prefilter.frag")?,
            brdf_lut,
        })
    }
}

/// Material pipelines, built on demand
pub struct MaterialPipelines {
    library: ShaderLibrary,
    wireframe_supported: bool,
    gbuffer: PipelineCache<GBufferPipelineKey, GraphicsPipeline>,
    forward: PipelineCache<ForwardPipelineKey, GraphicsPipeline>,
}

impl MaterialPipelines {
    /// Empty caches loading shaders from `library`
    pub fn new(library: ShaderLibrary, wireframe_supported: bool) -> Self {
        Self {
            library,
            wireframe_supported,
            gbuffer: PipelineCache::new(),
            forward: PipelineCache::new(),
        }
    }

    fn fragment_name(stem: &str, layout: &MaterialLayout) -> String {
        if layout.map_count() > 0 {
            format!("{stem}_maps.frag")
        } else {
            format!("{stem}.frag")
        }
    }

    /// Pipeline and layout for a gbuffer draw
    pub fn gbuffer(
        &mut self,
        device: &Device,
        passes: &RenderPasses,
        layouts: &DescriptorLayouts,
        key: GBufferPipelineKey,
    ) -> RenderResult<(vk::Pipeline, vk::PipelineLayout)> {
        let wireframe_supported = self.wireframe_supported;
        let library = &self.library;
        let pipeline = self.gbuffer.get_or_try_insert_with(key, |key| -> RenderResult<_> {
            let layout = MaterialLayout::from_flags(key.maps);
            let vertex = library.load(device, "gbuffer.vert")?;
            let fragment = library.load(device, &Self::fragment_name("gbuffer", &layout))?;
            let desc = PipelineDesc::mesh(&vertex, Some(&fragment))
                .cull(cull_mode(key.double_sided))
                .polygon_mode(polygon_mode(key.wireframe, wireframe_supported))
                .set_layouts(&[layouts.frame.handle(), layouts.material(layout.map_count())])
                .push::<ObjectPush>()
                .specialization(&layout.specialization());
            log::debug!("Built gbuffer pipeline for {key:?}");
            Ok(GraphicsPipeline::new(device, &passes.gbuffer, &desc)?)
        })?;
        Ok((pipeline.handle(), pipeline.layout()))
    }

    /// Pipeline and layout for a forward draw
    pub fn forward(
        &mut self,
        device: &Device,
        passes: &RenderPasses,
        layouts: &DescriptorLayouts,
        key: ForwardPipelineKey,
    ) -> RenderResult<(vk::Pipeline, vk::PipelineLayout)> {
        let wireframe_supported = self.wireframe_supported;
        let library = &self.library;
        let pipeline = self.forward.get_or_try_insert_with(key, |key| -> RenderResult<_> {
            let layout = MaterialLayout::from_flags(key.maps);
            let vertex = library.load(device, "forward.vert")?;
            let fragment = library.load(device, &Self::fragment_name("forward", &layout))?;

            let mut constants = layout.specialization().to_vec();
            constants.push(i32::from(key.shadows));
            let (blend, depth) = if key.translucent {
                (BlendMode::Alpha, DepthMode::Test(vk::CompareOp::LESS_OR_EQUAL))
            } else {
                (BlendMode::Opaque, DepthMode::Write(vk::CompareOp::LESS_OR_EQUAL))
            };
            let desc = PipelineDesc::mesh(&vertex, Some(&fragment))
                .blend(blend)
                .depth(depth)
                .cull(cull_mode(key.double_sided))
                .polygon_mode(polygon_mode(key.wireframe, wireframe_supported))
                .set_layouts(&[
                    layouts.frame.handle(),
                    layouts.material(layout.map_count()),
                    layouts.environment.handle(),
                ])
                .push::<ObjectPush>()
                .specialization(&constants);
            log::debug!("Built forward pipeline for {key:?}");
            Ok(GraphicsPipeline::new(device, &passes.forward, &desc)?)
        })?;
        Ok((pipeline.handle(), pipeline.layout()))
    }

    /// Pipelines built so far
    pub fn len(&self) -> usize {
        self.gbuffer.len() + self.forward.len()
    }

    /// Whether no material pipeline was built yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Polygon mode of a pipeline; wireframe falls back to filled without device support
fn polygon_mode(wireframe: bool, supported: bool) -> vk::PolygonMode {
    match (wireframe, supported) {
        (false, _) => vk::PolygonMode::FILL,
        (true, true) => vk::PolygonMode::LINE,
        (true, false) => {
            log::warn!("Wireframe rasterization unsupported, drawing filled");
            vk::PolygonMode::FILL
        }
    }
}

fn cull_mode(double_sided: bool) -> vk::CullModeFlags {
    if double_sided {
        vk::CullModeFlags::NONE
    } else {
        vk::CullModeFlags::BACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wireframe_falls_back_to_fill() {
        assert_eq!(polygon_mode(true, true), vk::PolygonMode::LINE);
        assert_eq!(polygon_mode(true, false), vk::PolygonMode::FILL);
        assert_eq!(polygon_mode(false, true), vk::PolygonMode::FILL);
    }

    #[test]
    fn test_variant_names() {
        use crate::graphics::desc::MaterialFlags;
        let plain = MaterialLayout::from_flags(MaterialFlags::TRANSLUCENT);
        let mapped = MaterialLayout::from_flags(MaterialFlags::ALBEDO_MAP);
        assert_eq!(MaterialPipelines::fragment_name("forward", &plain), "forward.frag");
        assert_eq!(MaterialPipelines::fragment_name("gbuffer", &mapped), "gbuffer_maps.frag");
        assert_eq!(cull_mode(true), vk::CullModeFlags::NONE);
    }
}
