//! Graphics pipeline creation
//!
//! A [`PipelineDesc`] lists the state that differs between the renderer's
//! pipelines; everything else (dynamic viewport and scissor, one sample,
//! triangle lists, counter-clockwise front faces) is shared.

use ash::{vk, Device};

use super::render_pass::RenderPass;
use super::shader::{ShaderModule, ENTRY_POINT};
use crate::assets::mesh::Vertex;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Stages every push constant block is visible to
pub const PUSH_STAGES: vk::ShaderStageFlags =
    vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

/// Vertex input of mesh pipelines
pub struct MeshVertexLayout;

impl MeshVertexLayout {
    /// One interleaved vertex buffer at binding 0
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position, texture coordinates and normal at locations 0, 1 and 2
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, texcoord) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Vertex, normal) as u32,
            },
        ]
    }
}

/// How fragments combine with the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Overwrite
    Opaque,
    /// Add color, used to accumulate lights
    Additive,
    /// Premultiplied-free alpha blending
    Alpha,
}

/// Depth state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthMode {
    /// No depth attachment or ignored
    Disabled,
    /// Test with `op` and write
    Write(vk::CompareOp),
    /// Test with `op` without writing
    Test(vk::CompareOp),
}

/// State of one pipeline
pub struct PipelineDesc<'a> {
    vertex: &'a ShaderModule,
    fragment: Option<&'a ShaderModule>,
    mesh_input: bool,
    blend: BlendMode,
    depth: DepthMode,
    cull: vk::CullModeFlags,
    polygon_mode: vk::PolygonMode,
    depth_bias: Option<(f32, f32)>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    push_size: u32,
    specialization: Vec<i32>,
}

impl<'a> PipelineDesc<'a> {
    /// Full-screen triangle: no vertex input, no depth, no culling
    pub fn fullscreen(vertex: &'a ShaderModule, fragment: &'a ShaderModule) -> Self {
        Self {
            vertex,
            fragment: Some(fragment),
            mesh_input: false,
            blend: BlendMode::Opaque,
            depth: DepthMode::Disabled,
            cull: vk::CullModeFlags::NONE,
            polygon_mode: vk::PolygonMode::FILL,
            depth_bias: None,
            set_layouts: Vec::new(),
            push_size: 0,
            specialization: Vec::new(),
        }
    }

    /// Mesh geometry with back-face culling and a depth test that writes
    pub fn mesh(vertex: &'a ShaderModule, fragment: Option<&'a ShaderModule>) -> Self {
        Self {
            mesh_input: true,
            fragment,
            depth: DepthMode::Write(vk::CompareOp::LESS),
            cull: vk::CullModeFlags::BACK,
            ..Self::fullscreen(vertex, vertex)
        }
    }

    /// Set blending
    pub fn blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    /// Set the depth state
    pub fn depth(mut self, depth: DepthMode) -> Self {
        self.depth = depth;
        self
    }

    /// Set culling
    pub fn cull(mut self, cull: vk::CullModeFlags) -> Self {
        self.cull = cull;
        self
    }

    /// Set the polygon mode
    pub fn polygon_mode(mut self, polygon_mode: vk::PolygonMode) -> Self {
        self.polygon_mode = polygon_mode;
        self
    }

    /// Constant and slope scaled depth bias
    pub fn depth_bias(mut self, constant: f32, slope: f32) -> Self {
        self.depth_bias = Some((constant, slope));
        self
    }

    /// Descriptor set layouts, set 0 first
    pub fn set_layouts(mut self, layouts: &[vk::DescriptorSetLayout]) -> Self {
        self.set_layouts = layouts.to_vec();
        self
    }

    /// Push constant block of `T`
    pub fn push<T>(mut self) -> Self {
        self.push_size = std::mem::size_of::<T>() as u32;
        self
    }

    /// Integer specialization constants of the fragment stage, IDs counting from 0
    pub fn specialization(mut self, constants: &[i32]) -> Self {
        self.specialization = constants.to_vec();
        self
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Create a pipeline for subpass 0 of `render_pass`
    pub fn new(device: &Device, render_pass: &RenderPass, desc: &PipelineDesc<'_>) -> VulkanResult<Self> {
        let push_ranges: Vec<vk::PushConstantRange> = if desc.push_size > 0 {
            vec![vk::PushConstantRange {
                stage_flags: PUSH_STAGES,
                offset: 0,
                size: desc.push_size,
            }]
        } else {
            Vec::new()
        };
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&desc.set_layouts)
            .push_constant_ranges(&push_ranges);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None).map_err(VulkanError::Api)? };

        match Self::create(device, render_pass, desc, layout) {
            Ok(pipeline) => Ok(Self {
                device: device.clone(),
                pipeline,
                layout,
            }),
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(e)
            }
        }
    }

    fn create(
        device: &Device,
        render_pass: &RenderPass,
        desc: &PipelineDesc<'_>,
        layout: vk::PipelineLayout,
    ) -> VulkanResult<vk::Pipeline> {
        let map_entries: Vec<vk::SpecializationMapEntry> = (0..desc.specialization.len())
            .map(|i| vk::SpecializationMapEntry {
                constant_id: i as u32,
                offset: (i * std::mem::size_of::<i32>()) as u32,
                size: std::mem::size_of::<i32>(),
            })
            .collect();
        let specialization_data: &[u8] = bytemuck::cast_slice(&desc.specialization);
        let specialization_info = vk::SpecializationInfo::builder()
            .map_entries(&map_entries)
            .data(specialization_data)
            .build();

        let mut shader_stages = vec![vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(desc.vertex.handle())
            .name(ENTRY_POINT)
            .build()];
        if let Some(fragment) = desc.fragment {
            let mut stage = vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment.handle())
                .name(ENTRY_POINT);
            if !map_entries.is_empty() {
                stage = stage.specialization_info(&specialization_info);
            }
            shader_stages.push(stage.build());
        }

        let bindings = [MeshVertexLayout::binding_description()];
        let attributes = MeshVertexLayout::attribute_descriptions();
        let vertex_input = if desc.mesh_input {
            vk::PipelineVertexInputStateCreateInfo::builder()
                .vertex_binding_descriptions(&bindings)
                .vertex_attribute_descriptions(&attributes)
                .build()
        } else {
            vk::PipelineVertexInputStateCreateInfo::default()
        };

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let (bias_constant, bias_slope) = desc.depth_bias.unwrap_or((0.0, 0.0));
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(desc.polygon_mode)
            .line_width(1.0)
            .cull_mode(desc.cull)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(desc.depth_bias.is_some())
            .depth_bias_constant_factor(bias_constant)
            .depth_bias_slope_factor(bias_slope);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let (test, write, compare) = match desc.depth {
            DepthMode::Disabled => (false, false, vk::CompareOp::ALWAYS),
            DepthMode::Write(op) => (true, true, op),
            DepthMode::Test(op) => (true, false, op),
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(test)
            .depth_write_enable(write)
            .depth_compare_op(compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachment = blend_state(desc.blend);
        let blend_attachments = vec![blend_attachment; render_pass.color_count() as usize];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass.handle())
            .subpass(0);

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
                .map_err(|(_, err)| VulkanError::Api(err))?
        };
        pipelines.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Driver returned no pipeline".to_string(),
        })
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

fn blend_state(blend: BlendMode) -> vk::PipelineColorBlendAttachmentState {
    let builder = vk::PipelineColorBlendAttachmentState::builder().color_write_mask(vk::ColorComponentFlags::RGBA);
    match blend {
        BlendMode::Opaque => builder.blend_enable(false),
        BlendMode::Additive => builder
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ONE)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE)
            .alpha_blend_op(vk::BlendOp::ADD),
        BlendMode::Alpha => builder
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .alpha_blend_op(vk::BlendOp::ADD),
    }
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_matches_vertex() {
        let binding = MeshVertexLayout::binding_description();
        assert_eq!(binding.stride, 32);
        let offsets: Vec<u32> = MeshVertexLayout::attribute_descriptions()
            .iter()
            .map(|a| a.offset)
            .collect();
        assert_eq!(offsets, vec![0, 12, 20]);
    }

    #[test]
    fn test_additive_blend_adds() {
        let state = blend_state(BlendMode::Additive);
        assert_eq!(state.blend_enable, vk::TRUE);
        assert_eq!(state.dst_color_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(blend_state(BlendMode::Opaque).blend_enable, vk::FALSE);
    }

    #[test]
    fn test_push_stages_cover_both_shaders() {
        assert!(PUSH_STAGES.contains(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT));
    }
}
