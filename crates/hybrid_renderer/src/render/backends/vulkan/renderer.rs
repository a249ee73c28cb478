//! Vulkan implementation of [`GraphicsBackend`]
//!
//! Every frame records into one command buffer of the ring. A view records
//! its passes in order against its viewport's framebuffers; uniform blocks
//! are updated in the command stream between render passes. `present` blits
//! a viewport's tone-mapped output to the swapchain in a second, small
//! submission, then acquires the image the next present will write.
//!
//! Validation, pass bookkeeping and resource lifetimes follow
//! [`NullBackend`](crate::graphics::NullBackend) exactly; only the recording differs.

use std::rc::Rc;

use ash::vk;

use super::initialization::surface::NativeWindow;
use super::rendering::commands::{begin_commands, begin_render_pass, push_constants, CommandPool};
use super::rendering::pipeline::{GraphicsPipeline, PUSH_STAGES};
use super::rendering::pipelines::{FixedPipelines, MaterialPipelines};
use super::rendering::render_pass::RenderPasses;
use super::rendering::shader::ShaderLibrary;
use super::resources::descriptor_set::{DescriptorLayouts, DescriptorPool};
use super::resources::environment::{BrdfLut, VulkanEnvironment};
use super::resources::image::{transition_image, Sampler, Transition};
use super::resources::material::VulkanMaterial;
use super::resources::mesh::{MeshBinding, VulkanMesh};
use super::resources::shadow::ShadowMap;
use super::resources::texture::VulkanTexture;
use super::resources::uniforms::FrameUniforms;
use super::resources::viewport::{ViewTargets, ViewportSamplers, VulkanViewport};
use super::state::frame::FrameSlot;
use super::state::swapchain::Swapchain;
use super::state::sync::{Fence, FrameSync};
use super::{GpuDevice, VulkanContext, VulkanError};
use crate::assets::mesh::MeshData;
use crate::core::config::RendererConfig;
use crate::foundation::math::{Mat4, Vec3};
use crate::graphics::backend::GraphicsBackend;
use crate::graphics::bake::BakePlan;
use crate::graphics::cascades::CascadeFit;
use crate::graphics::components::{Camera, DirectionalLight, Geometry, Light, PointLight, Transform};
use crate::graphics::desc::{
    EnvironmentDesc, Filter, MaterialDesc, PixelFormat, TextureDesc, TextureKind, TextureRegion,
    ViewportDesc, Wrap,
};
use crate::graphics::error::{RenderError, RenderResult};
use crate::graphics::forward::ForwardQueue;
use crate::graphics::frame::CommandRing;
use crate::graphics::handles::{
    EnvironmentHandle, MaterialHandle, MeshHandle, ResourceTable, TextureHandle, ViewportHandle,
};
use crate::graphics::limits::GraphicsLimits;
use crate::graphics::pass::{PassKind, PassTracker};
use crate::graphics::pipeline_key::{ForwardPipelineKey, GBufferPipelineKey};
use crate::graphics::postprocess::PostprocessChain;
use crate::graphics::uniforms::{CameraUniform, LightPush, LightUniform, ObjectPush, PostPush, ShadowPush, ShadowUniform};
use crate::graphics::viewport_layout::TargetRole;

/// Descriptor sets the backend can hand out at once
const MAX_DESCRIPTOR_SETS: u32 = 1024;

/// A material draw resolved to plain handles
#[derive(Clone, Copy)]
struct MaterialDraw {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    material_set: vk::DescriptorSet,
    object: ObjectPush,
    mesh: MeshBinding,
}

/// Swapchain image acquired by one present for the next
#[derive(Clone, Copy)]
struct AcquiredImage {
    index: u32,
    suboptimal: bool,
    /// Present sync whose `image_available` the acquire signals
    sync: usize,
}

struct ViewState {
    targets: ViewTargets,
    environment_set: vk::DescriptorSet,
    cascades: CascadeFit,
    cascade_matrix: Mat4,
}

/// Vulkan renderer
///
/// Fields drop in declaration order: resources first, then the objects they
/// were allocated from, the device last.
pub struct VulkanBackend {
    textures: ResourceTable<TextureHandle, Rc<VulkanTexture>>,
    materials: ResourceTable<MaterialHandle, VulkanMaterial>,
    meshes: ResourceTable<MeshHandle, VulkanMesh>,
    environments: ResourceTable<EnvironmentHandle, VulkanEnvironment>,
    viewports: ResourceTable<ViewportHandle, VulkanViewport>,
    default_environment: VulkanEnvironment,

    uniforms: FrameUniforms,
    shadow_map: ShadowMap,
    /// Sampled through binding 4 of the frame set
    _brdf_lut: BrdfLut,
    material_pipelines: MaterialPipelines,
    pipelines: FixedPipelines,
    color_sampler: Sampler,
    depth_sampler: Sampler,
    descriptor_pool: DescriptorPool,
    layouts: DescriptorLayouts,
    passes: RenderPasses,

    present_syncs: Vec<FrameSync>,
    swapchain: Swapchain,
    ring: CommandRing<FrameSlot>,
    command_pool: CommandPool,
    gpu: GpuDevice,
    context: VulkanContext,

    config: RendererConfig,
    window_extent: vk::Extent2D,
    swapchain_stale: bool,
    acquired: Option<AcquiredImage>,
    tracker: PassTracker,
    command_buffer: vk::CommandBuffer,
    view: Option<ViewState>,
    forward_queue: ForwardQueue<MaterialDraw>,
    post_chain: PostprocessChain,
    lights: LightUniform,
    shadow: ShadowUniform,
    pending_present: bool,
}

impl VulkanBackend {
    /// Create the device for `window`, build every fixed pipeline and bake the BRDF table
    pub fn new(window: &mut dyn NativeWindow, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        log::info!("Creating Vulkan backend for {}", config.application_name);

        let context = VulkanContext::new(window, &config.application_name, config.validation_enabled())?;
        let gpu = context.gpu();
        let (width, height) = window.framebuffer_size();
        let window_extent = vk::Extent2D { width, height };

        let command_pool = CommandPool::new(&gpu)?;
        let ring = CommandRing::try_new(|_| FrameSlot::new(gpu.device.clone()))?;
        let swapchain = Swapchain::new(
            context.instance(),
            &gpu.device,
            context.surface,
            &context.surface_loader,
            &context.physical_device,
            window_extent,
            config.present_mode,
            vk::SwapchainKHR::null(),
        )?;
        let present_syncs = (0..GraphicsLimits::COMMAND_RING_SIZE)
            .map(|_| FrameSync::new(&gpu.device, command_pool.allocate_one()?))
            .collect::<Result<Vec<_>, _>>()?;

        let passes = RenderPasses::new(&gpu.device)?;
        let layouts = DescriptorLayouts::new(&gpu.device)?;
        let descriptor_pool = DescriptorPool::new(gpu.device.clone(), MAX_DESCRIPTOR_SETS)?;
        let color_sampler = Sampler::linear_clamp(&gpu)?;
        let depth_sampler = Sampler::new(&gpu, Filter::Nearest, Wrap::ClampToEdge, 1)?;

        let library = ShaderLibrary::new(&config.shader_dir);
        let pipelines = FixedPipelines::new(&gpu.device, &library, &passes, &layouts)?;
        let material_pipelines = MaterialPipelines::new(library, gpu.supports_wireframe());

        let brdf_lut = BrdfLut::bake(&gpu, &command_pool, &passes, &pipelines, config.ibl.brdf_lut_size)?;
        let shadow_map = ShadowMap::new(&gpu, &command_pool, &passes.shadow, config.shadows.map_size)?;
        let uniforms = FrameUniforms::new(
            &gpu,
            &command_pool,
            &descriptor_pool,
            &layouts,
            shadow_map.descriptor(),
            brdf_lut.descriptor(),
        )?;

        // cameras without an environment see black and get no ambient light
        let black = Rc::new(VulkanTexture::new(
            &gpu,
            &command_pool,
            &TextureDesc::cube(1, PixelFormat::Rgba16F).with_wrap(Wrap::ClampToEdge),
        )?);
        let default_environment = VulkanEnvironment::bake(
            &gpu,
            &command_pool,
            &descriptor_pool,
            &passes,
            &layouts,
            &pipelines,
            &BakePlan::new(1, 1, 1),
            black,
        )?;

        log::info!("Vulkan backend ready");
        Ok(Self {
            textures: ResourceTable::new("texture"),
            materials: ResourceTable::new("material"),
            meshes: ResourceTable::new("mesh"),
            environments: ResourceTable::new("environment"),
            viewports: ResourceTable::new("viewport"),
            default_environment,
            uniforms,
            shadow_map,
            _brdf_lut: brdf_lut,
            material_pipelines,
            pipelines,
            color_sampler,
            depth_sampler,
            descriptor_pool,
            layouts,
            passes,
            present_syncs,
            swapchain,
            ring,
            command_pool,
            gpu,
            context,
            config,
            window_extent,
            swapchain_stale: false,
            acquired: None,
            tracker: PassTracker::new(),
            command_buffer: vk::CommandBuffer::null(),
            view: None,
            forward_queue: ForwardQueue::new(),
            post_chain: PostprocessChain::new(),
            lights: LightUniform::default(),
            shadow: ShadowUniform::default(),
            pending_present: false,
        })
    }

    /// Record a new window size; the swapchain is rebuilt before the next present
    pub fn resize(&mut self, width: u32, height: u32) {
        self.window_extent = vk::Extent2D { width, height };
        self.swapchain_stale = true;
    }

    /// Pass bookkeeping
    pub fn tracker(&self) -> &PassTracker {
        &self.tracker
    }

    /// Material pipelines built so far
    pub fn material_pipeline_count(&self) -> usize {
        self.material_pipelines.len()
    }

    fn retire_slot(&self) -> usize {
        if self.tracker.is_recording() {
            self.ring.index()
        } else {
            self.ring.previous_index()
        }
    }

    fn collect(&mut self, slot: usize) {
        self.textures.collect(slot);
        self.materials.collect(slot);
        self.meshes.collect(slot);
        self.environments.collect(slot);
        self.viewports.collect(slot);
    }

    /// Run the passes the caller left out, empty, so later passes see initialized images
    fn complete_pending(&mut self, next: Option<PassKind>) -> RenderResult<()> {
        for kind in self.tracker.pending_passes(next) {
            log::trace!("Running skipped {} pass", kind.name());
            match kind {
                PassKind::Light => {
                    self.begin_light_pass()?;
                    self.end_light_pass()?;
                }
                PassKind::Forward => {
                    self.begin_forward_pass()?;
                    self.end_forward_pass()?;
                }
                PassKind::Postprocess => {
                    self.begin_postprocess_pass()?;
                    self.end_postprocess_pass()?;
                }
                PassKind::Depth | PassKind::Shadow => {}
            }
        }
        Ok(())
    }

    fn view(&self) -> RenderResult<&ViewState> {
        self.view.as_ref().ok_or(RenderError::InvalidPassTransition {
            action: "record without a view",
            state: self.tracker.state(),
        })
    }

    fn wait_fence(fence: &Fence, what: &'static str) -> RenderResult<()> {
        match fence.wait(GraphicsLimits::FENCE_TIMEOUT_NS) {
            Err(VulkanError::Api(vk::Result::TIMEOUT)) => Err(RenderError::Timeout {
                what,
                timeout_ns: GraphicsLimits::FENCE_TIMEOUT_NS,
            }),
            result => Ok(result?),
        }
    }

    fn begin_target(&self, render_pass: vk::RenderPass, framebuffer: vk::Framebuffer, extent: vk::Extent2D, clears: &[vk::ClearValue]) {
        begin_render_pass(&self.gpu.device, self.command_buffer, render_pass, framebuffer, extent, clears);
    }

    fn end_target(&self) {
        unsafe {
            self.gpu.device.cmd_end_render_pass(self.command_buffer);
        }
    }

    /// Bind a pipeline with its descriptor sets, starting at set 0
    fn bind(&self, pipeline: vk::Pipeline, layout: vk::PipelineLayout, sets: &[vk::DescriptorSet]) {
        let device = &self.gpu.device;
        unsafe {
            device.cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
            if !sets.is_empty() {
                device.cmd_bind_descriptor_sets(
                    self.command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    0,
                    sets,
                    &[],
                );
            }
        }
    }

    fn draw_fullscreen(&self) {
        unsafe {
            self.gpu.device.cmd_draw(self.command_buffer, 3, 1, 0, 0);
        }
    }

    fn record_material_draw(&self, draw: &MaterialDraw, environment: Option<vk::DescriptorSet>) {
        let frame = self.uniforms.set();
        match environment {
            Some(environment) => self.bind(draw.pipeline, draw.layout, &[frame, draw.material_set, environment]),
            None => self.bind(draw.pipeline, draw.layout, &[frame, draw.material_set]),
        }
        push_constants(&self.gpu.device, self.command_buffer, draw.layout, PUSH_STAGES, &draw.object);
        draw.mesh.record(&self.gpu.device, self.command_buffer);
    }

    fn light_draw(&self, pipeline: &GraphicsPipeline, push: &LightPush) -> RenderResult<()> {
        let view = self.view()?;
        self.bind(
            pipeline.handle(),
            pipeline.layout(),
            &[self.uniforms.set(), view.targets.gbuffer_inputs, view.environment_set],
        );
        push_constants(&self.gpu.device, self.command_buffer, pipeline.layout(), PUSH_STAGES, push);
        self.draw_fullscreen();
        Ok(())
    }

    fn effect(&mut self, call: &'static str, select: fn(&FixedPipelines) -> &GraphicsPipeline, amount: f32, color: Option<Vec3>) -> RenderResult<()> {
        self.tracker.draw_effect(call)?;
        let (read, write) = self.post_chain.advance();
        let targets = self.view()?.targets;
        let pipeline = select(&self.pipelines);

        let mut push = PostPush::new(amount, self.config.exposure, targets.extent.width, targets.extent.height);
        if let Some(color) = color {
            push = push.with_color(color);
        }
        self.begin_target(self.passes.post.handle(), targets.post[write], targets.extent, &[]);
        self.bind(pipeline.handle(), pipeline.layout(), &[self.uniforms.set(), targets.source_inputs(read)]);
        push_constants(&self.gpu.device, self.command_buffer, pipeline.layout(), PUSH_STAGES, &push);
        self.draw_fullscreen();
        self.end_target();
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> RenderResult<()> {
        unsafe { self.gpu.device.device_wait_idle() }.map_err(VulkanError::Api)?;
        if let Some(acquired) = self.acquired.take() {
            // the image is never presented, so nothing waits on its semaphore
            self.present_syncs[acquired.sync].renew_image_available(&self.gpu.device)?;
        }
        let swapchain = Swapchain::new(
            self.context.instance(),
            &self.gpu.device,
            self.context.surface,
            &self.context.surface_loader,
            &self.context.physical_device,
            self.window_extent,
            self.config.present_mode,
            self.swapchain.handle(),
        )?;
        self.swapchain = swapchain;
        self.swapchain_stale = false;
        log::debug!(
            "Recreated swapchain at {}x{}",
            self.swapchain.extent().width,
            self.swapchain.extent().height
        );
        Ok(())
    }

    /// Acquire the image a later present writes, signalling the semaphore of present sync `sync`
    fn acquire_image(&mut self, sync: usize) -> RenderResult<Option<AcquiredImage>> {
        let present = &self.present_syncs[sync];
        // the last blit through this sync waited on the semaphore being signalled again
        Self::wait_fence(&present.in_flight, "present fence")?;
        let acquired = self
            .swapchain
            .acquire_next_image(present.image_available.handle(), u64::MAX)?
            .map(|(index, suboptimal)| AcquiredImage { index, suboptimal, sync });
        if acquired.is_none() {
            log::debug!("Swapchain out of date");
            self.swapchain_stale = true;
        }
        Ok(acquired)
    }

    fn record_blit(&self, command_buffer: vk::CommandBuffer, source: vk::Image, source_extent: vk::Extent2D, image_index: u32) -> RenderResult<()> {
        let device = &self.gpu.device;
        let target = self.swapchain.image(image_index);
        let target_extent = self.swapchain.extent();
        let color_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let layers = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let corner = |extent: vk::Extent2D| vk::Offset3D {
            x: extent.width as i32,
            y: extent.height as i32,
            z: 1,
        };
        let region = vk::ImageBlit {
            src_subresource: layers,
            src_offsets: [vk::Offset3D::default(), corner(source_extent)],
            dst_subresource: layers,
            dst_offsets: [vk::Offset3D::default(), corner(target_extent)],
        };

        begin_commands(device, command_buffer)?;
        transition_image(device, command_buffer, target, color_range, Transition::UNDEFINED_TO_TRANSFER_DST);
        unsafe {
            device.cmd_blit_image(
                command_buffer,
                source,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                target,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
                vk::Filter::LINEAR,
            );
        }
        transition_image(device, command_buffer, target, color_range, Transition::TRANSFER_DST_TO_PRESENT);
        unsafe { device.end_command_buffer(command_buffer) }.map_err(VulkanError::Api)?;
        Ok(())
    }
}

impl GraphicsBackend for VulkanBackend {
    fn make_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle> {
        desc.validate()?;
        let texture = VulkanTexture::new(&self.gpu, &self.command_pool, desc)?;
        Ok(self.textures.insert(Rc::new(texture)))
    }

    fn update_texture(
        &mut self,
        texture: TextureHandle,
        pixels: &[u8],
        region: TextureRegion,
    ) -> RenderResult<()> {
        let texture = self.textures.get(texture)?;
        texture.desc().check_update(pixels.len(), region)?;
        texture.update(&self.gpu, &self.command_pool, pixels, region)
    }

    fn make_material(&mut self, desc: &MaterialDesc) -> RenderResult<MaterialHandle> {
        desc.validate()?;
        let maps = desc
            .maps
            .present()
            .into_iter()
            .map(|map| self.textures.get(map).map(Rc::clone))
            .collect::<RenderResult<Vec<_>>>()?;
        let material = VulkanMaterial::new(
            &self.gpu,
            &self.command_pool,
            &self.descriptor_pool,
            &self.layouts,
            desc,
            maps,
        )?;
        Ok(self.materials.insert(material))
    }

    fn make_mesh(&mut self, mesh: &MeshData) -> RenderResult<MeshHandle> {
        mesh.validate()?;
        let mesh = VulkanMesh::new(&self.gpu, &self.command_pool, mesh)?;
        Ok(self.meshes.insert(mesh))
    }

    fn make_environment(&mut self, desc: &EnvironmentDesc) -> RenderResult<EnvironmentHandle> {
        let skybox = self.textures.get(desc.skybox)?;
        if skybox.desc().kind != TextureKind::Cube {
            return Err(RenderError::NotACubemap);
        }
        let environment = VulkanEnvironment::bake(
            &self.gpu,
            &self.command_pool,
            &self.descriptor_pool,
            &self.passes,
            &self.layouts,
            &self.pipelines,
            &BakePlan::from_config(&self.config.ibl),
            Rc::clone(skybox),
        )?;
        Ok(self.environments.insert(environment))
    }

    fn make_viewport(&mut self, desc: &ViewportDesc) -> RenderResult<ViewportHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::InvalidViewport {
                width: desc.width,
                height: desc.height,
            });
        }
        let viewport = VulkanViewport::new(
            &self.gpu,
            &self.command_pool,
            &self.descriptor_pool,
            &self.passes,
            &self.layouts,
            ViewportSamplers {
                color: self.color_sampler.handle(),
                depth: self.depth_sampler.handle(),
            },
            self.config.clear_color,
            desc.width,
            desc.height,
        )?;
        Ok(self.viewports.insert(viewport))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> RenderResult<()> {
        let slot = self.retire_slot();
        self.textures.retire(texture, slot)
    }

    fn destroy_material(&mut self, material: MaterialHandle) -> RenderResult<()> {
        let slot = self.retire_slot();
        self.materials.retire(material, slot)
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) -> RenderResult<()> {
        let slot = self.retire_slot();
        self.meshes.retire(mesh, slot)
    }

    fn destroy_environment(&mut self, environment: EnvironmentHandle) -> RenderResult<()> {
        let slot = self.retire_slot();
        self.environments.retire(environment, slot)
    }

    fn destroy_viewport(&mut self, viewport: ViewportHandle) -> RenderResult<()> {
        let slot = self.retire_slot();
        self.viewports.retire(viewport, slot)
    }

    fn mesh_lod_count(&self, mesh: MeshHandle) -> RenderResult<u32> {
        Ok(self.meshes.get(mesh)?.lod_count())
    }

    fn material_translucent(&self, material: MaterialHandle) -> RenderResult<bool> {
        Ok(self.materials.get(material)?.is_translucent())
    }

    fn viewport_size(&self, viewport: ViewportHandle) -> RenderResult<(u32, u32)> {
        let layout = self.viewports.get(viewport)?.layout();
        Ok((layout.width(), layout.height()))
    }

    fn begin(&mut self) -> RenderResult<()> {
        if self.tracker.is_recording() {
            // fails with the transition error without touching the ring
            return self.tracker.begin_frame();
        }
        self.ring.acquire()?;
        let slot = self.ring.index();
        // the blit that followed this slot's last frame may still read its viewport
        Self::wait_fence(&self.present_syncs[slot].in_flight, "present fence")?;
        self.collect(slot);

        let command_buffer = match self.ring.current().command_buffer() {
            Some(command_buffer) => command_buffer,
            None => {
                let command_buffer = self.command_pool.allocate_one()?;
                self.ring.current_mut().set_command_buffer(command_buffer);
                command_buffer
            }
        };
        begin_commands(&self.gpu.device, command_buffer)?;
        self.tracker.begin_frame()?;
        self.command_buffer = command_buffer;
        self.view = None;
        log::trace!("Recording frame into slot {slot}");
        Ok(())
    }

    fn command_index(&self) -> usize {
        self.ring.index()
    }

    fn begin_depth_pass(
        &mut self,
        viewport: ViewportHandle,
        camera_transform: &Transform,
        camera: &Camera,
    ) -> RenderResult<()> {
        let target = self.viewports.get(viewport)?;
        let targets = target.targets();
        let previous = target.previous_view_projection().copied();
        let environment_set = match camera.environment {
            Some(environment) => self.environments.get(environment)?.set(),
            None => self.default_environment.set(),
        };
        self.complete_pending(Some(PassKind::Depth))?;
        self.tracker.begin_pass(PassKind::Depth)?;

        let extent = targets.extent;
        let camera_uniform = CameraUniform::new(camera_transform, camera, extent.width, extent.height, previous.as_ref());
        self.viewports
            .get_mut(viewport)?
            .set_previous_view_projection(camera_uniform.view_projection_matrix());

        let aspect = extent.width as f32 / extent.height as f32;
        self.view = Some(ViewState {
            targets,
            environment_set,
            cascades: CascadeFit::new(camera_transform, camera, aspect, &self.config.shadows),
            cascade_matrix: Mat4::identity(),
        });
        self.shadow.reset(self.config.shadows.map_size);
        self.lights.clear();

        self.uniforms.camera.record_uniform_update(self.command_buffer, &camera_uniform);
        let clears = [
            vk::ClearValue::default(),
            vk::ClearValue::default(),
            vk::ClearValue::default(),
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        self.begin_target(self.passes.gbuffer.handle(), targets.gbuffer, extent, &clears);
        Ok(())
    }

    fn draw_depth(&mut self, transform: &Transform, geometry: &Geometry, lod: u32) -> RenderResult<()> {
        self.tracker.require(PassKind::Depth, "draw_depth")?;
        let mesh = self.meshes.get(geometry.mesh)?;
        let material = self.materials.get(geometry.material)?;
        if material.is_translucent() {
            return Ok(());
        }
        let (pipeline, layout) = self.material_pipelines.gbuffer(
            &self.gpu.device,
            &self.passes,
            &self.layouts,
            GBufferPipelineKey::from_flags(material.flags()),
        )?;
        let draw = MaterialDraw {
            pipeline,
            layout,
            material_set: material.set(),
            object: ObjectPush::new(transform),
            mesh: mesh.binding(lod),
        };
        self.record_material_draw(&draw, None);
        Ok(())
    }

    fn end_depth_pass(&mut self) -> RenderResult<()> {
        self.tracker.end_pass(PassKind::Depth)?;
        self.end_target();
        Ok(())
    }

    fn begin_shadow_pass(
        &mut self,
        transform: &Transform,
        _light: &Light,
        _directional: &DirectionalLight,
        cascade: u32,
    ) -> RenderResult<()> {
        self.tracker.begin_shadow(cascade)?;
        if let Some(view) = &mut self.view {
            let matrix = view.cascades.light_view_projection(cascade, &transform.forward());
            let (_, split) = view.cascades.slice(cascade);
            self.shadow.set_cascade(cascade, &matrix, split);
            view.cascade_matrix = matrix;
        }

        let framebuffer = self.shadow_map.framebuffer(cascade);
        let clears = [vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        }];
        self.begin_target(self.passes.shadow.handle(), framebuffer.handle(), framebuffer.extent(), &clears);
        self.bind(self.pipelines.shadow.handle(), self.pipelines.shadow.layout(), &[]);
        Ok(())
    }

    fn draw_shadow(&mut self, transform: &Transform, geometry: &Geometry, lod: u32) -> RenderResult<()> {
        self.tracker.require(PassKind::Shadow, "draw_shadow")?;
        let binding = self.meshes.get(geometry.mesh)?.binding(lod);
        self.materials.get(geometry.material)?;
        let push = ShadowPush::new(&self.view()?.cascade_matrix, transform);
        push_constants(
            &self.gpu.device,
            self.command_buffer,
            self.pipelines.shadow.layout(),
            PUSH_STAGES,
            &push,
        );
        binding.record(&self.gpu.device, self.command_buffer);
        Ok(())
    }

    fn end_shadow_pass(&mut self) -> RenderResult<()> {
        self.tracker.end_pass(PassKind::Shadow)?;
        self.end_target();
        Ok(())
    }

    fn begin_light_pass(&mut self) -> RenderResult<()> {
        self.complete_pending(Some(PassKind::Light))?;
        self.tracker.begin_pass(PassKind::Light)?;
        self.lights.clear();

        self.uniforms.shadow.record_uniform_update(self.command_buffer, &self.shadow);
        let targets = self.view()?.targets;
        self.begin_target(self.passes.light.handle(), targets.light, targets.extent, &[vk::ClearValue::default()]);
        self.light_draw(&self.pipelines.light_ambient, &LightPush::default())
    }

    fn add_point_light(&mut self, transform: &Transform, light: &Light, point: &PointLight) -> RenderResult<()> {
        self.tracker.require(PassKind::Light, "add_point_light")?;
        let Some(data) = self.lights.push_point(transform, light, point) else {
            log::warn!("More than {} point lights, extra lights ignored", GraphicsLimits::MAX_POINT_LIGHTS);
            return Ok(());
        };
        self.light_draw(&self.pipelines.light_point, &LightPush::from(data))
    }

    fn add_directional_light(
        &mut self,
        transform: &Transform,
        light: &Light,
        _directional: &DirectionalLight,
    ) -> RenderResult<()> {
        self.tracker.require(PassKind::Light, "add_directional_light")?;
        let casts = light.shadow_enabled && self.shadow.cascade_count() > 0;
        let Some(data) = self.lights.push_directional(transform, light, casts) else {
            log::warn!(
                "More than {} directional lights, extra lights ignored",
                GraphicsLimits::MAX_DIRECTIONAL_LIGHTS
            );
            return Ok(());
        };
        self.light_draw(&self.pipelines.light_directional, &LightPush::from(data))
    }

    fn end_light_pass(&mut self) -> RenderResult<()> {
        self.tracker.end_pass(PassKind::Light)?;
        self.end_target();
        self.uniforms.lights.record_uniform_update(self.command_buffer, &self.lights);
        log::trace!(
            "Light pass published {} point and {} directional lights",
            self.lights.point_count(),
            self.lights.directional_count()
        );
        Ok(())
    }

    fn begin_forward_pass(&mut self) -> RenderResult<()> {
        self.complete_pending(Some(PassKind::Forward))?;
        self.tracker.begin_pass(PassKind::Forward)?;
        self.forward_queue.clear();

        let targets = self.view()?.targets;
        let clears = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.config.clear_color,
                },
            },
            vk::ClearValue::default(),
        ];
        self.begin_target(self.passes.forward.handle(), targets.forward, targets.extent, &clears);
        let compose = &self.pipelines.compose;
        self.bind(compose.handle(), compose.layout(), &[self.uniforms.set(), targets.light_input]);
        self.draw_fullscreen();
        Ok(())
    }

    fn draw_skybox(&mut self) -> RenderResult<()> {
        self.tracker.require(PassKind::Forward, "draw_skybox")?;
        let view = self.view()?;
        let skybox = &self.pipelines.skybox;
        self.bind(
            skybox.handle(),
            skybox.layout(),
            &[self.uniforms.set(), view.targets.light_input, view.environment_set],
        );
        self.draw_fullscreen();
        Ok(())
    }

    fn draw_forward(&mut self, transform: &Transform, geometry: &Geometry, lod: u32) -> RenderResult<()> {
        self.tracker.require(PassKind::Forward, "draw_forward")?;
        let mesh = self.meshes.get(geometry.mesh)?;
        let material = self.materials.get(geometry.material)?;
        let translucent = material.is_translucent();
        let key = ForwardPipelineKey::from_flags(material.flags(), self.shadow.cascade_count() > 0);
        let (pipeline, layout) = self
            .material_pipelines
            .forward(&self.gpu.device, &self.passes, &self.layouts, key)?;
        let draw = MaterialDraw {
            pipeline,
            layout,
            material_set: material.set(),
            object: ObjectPush::new(transform),
            mesh: mesh.binding(lod),
        };
        if let Some(draw) = self.forward_queue.submit(draw, translucent) {
            let environment = self.view()?.environment_set;
            self.record_material_draw(&draw, Some(environment));
        }
        Ok(())
    }

    fn end_forward_pass(&mut self) -> RenderResult<()> {
        self.tracker.end_pass(PassKind::Forward)?;
        let environment = self.view()?.environment_set;
        let translucent: Vec<MaterialDraw> = self.forward_queue.drain().collect();
        for draw in &translucent {
            self.record_material_draw(draw, Some(environment));
        }
        self.end_target();
        Ok(())
    }

    fn begin_postprocess_pass(&mut self) -> RenderResult<()> {
        self.complete_pending(Some(PassKind::Postprocess))?;
        self.tracker.begin_pass(PassKind::Postprocess)?;
        self.post_chain = PostprocessChain::new();
        Ok(())
    }

    fn next_postprocess_pass(&mut self) -> RenderResult<()> {
        self.tracker.next_effect()
    }

    fn draw_fxaa(&mut self) -> RenderResult<()> {
        self.effect("draw_fxaa", |p| &p.fxaa, 0.0, None)
    }

    fn draw_sharpen(&mut self, amount: f32) -> RenderResult<()> {
        self.effect("draw_sharpen", |p| &p.sharpen, amount, None)
    }

    fn draw_motion_blur(&mut self, strength: f32) -> RenderResult<()> {
        self.effect("draw_motion_blur", |p| &p.motion_blur, strength, None)
    }

    fn draw_blur(&mut self, radius: f32) -> RenderResult<()> {
        self.effect("draw_blur", |p| &p.blur, radius, None)
    }

    fn draw_outline(&mut self, color: Vec3, thickness: f32) -> RenderResult<()> {
        self.effect("draw_outline", |p| &p.outline, thickness, Some(color))
    }

    fn end_postprocess_pass(&mut self) -> RenderResult<()> {
        self.tracker.end_pass(PassKind::Postprocess)?;
        let targets = self.view()?.targets;
        let tonemap = &self.pipelines.tonemap;
        let push = PostPush::new(0.0, self.config.exposure, targets.extent.width, targets.extent.height);

        self.begin_target(self.passes.fill.handle(), targets.fill, targets.extent, &[]);
        self.bind(
            tonemap.handle(),
            tonemap.layout(),
            &[self.uniforms.set(), targets.source_inputs(self.post_chain.source())],
        );
        push_constants(&self.gpu.device, self.command_buffer, tonemap.layout(), PUSH_STAGES, &push);
        self.draw_fullscreen();
        self.end_target();
        Ok(())
    }

    fn end(&mut self) -> RenderResult<()> {
        self.complete_pending(None)?;
        self.tracker.end_frame()?;

        let device = &self.gpu.device;
        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe {
            device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;
        }
        self.ring.arm()?;
        unsafe {
            device
                .queue_submit(self.gpu.graphics_queue, &[submit_info.build()], self.ring.current().fence())
                .map_err(VulkanError::Api)?;
        }

        self.ring.advance();
        self.view = None;
        self.command_buffer = vk::CommandBuffer::null();
        self.pending_present = true;
        Ok(())
    }

    fn present(&mut self, viewport: ViewportHandle) -> RenderResult<()> {
        if self.tracker.is_recording() {
            return Err(RenderError::NothingToPresent("the frame is still recording"));
        }
        if !self.pending_present {
            return Err(RenderError::NothingToPresent("no frame submitted since the last present"));
        }
        let target = self.viewports.get(viewport)?;
        let (source, source_extent) = target
            .image(TargetRole::Fill)
            .map(|image| (image.handle(), image.extent()))
            .ok_or(RenderError::ResourceNotFound { kind: "viewport output" })?;
        self.pending_present = false;

        if self.swapchain_stale {
            if self.window_extent.width == 0 || self.window_extent.height == 0 {
                // minimized, nothing to show
                return Ok(());
            }
            self.recreate_swapchain()?;
        }

        let acquired = match self.acquired.take() {
            Some(acquired) => acquired,
            // first present, or the swapchain was rebuilt since the last one
            None => match self.acquire_image(self.ring.previous_index())? {
                Some(acquired) => acquired,
                None => {
                    log::debug!("Frame dropped");
                    return Ok(());
                }
            },
        };
        let image_index = acquired.index;
        let sync = &self.present_syncs[acquired.sync];

        self.record_blit(sync.command_buffer, source, source_extent, image_index)?;
        sync.in_flight.reset()?;
        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::TRANSFER];
        let command_buffers = [sync.command_buffer];
        let signal_semaphores = [sync.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            self.gpu
                .device
                .queue_submit(self.gpu.graphics_queue, &[submit_info.build()], sync.in_flight.handle())
                .map_err(VulkanError::Api)?;
        }

        let stale = self
            .swapchain
            .present(self.context.present_queue(), image_index, sync.render_finished.handle())?;
        self.swapchain_stale = stale || acquired.suboptimal;

        // the next frame's image is acquired now, while this one is on screen
        if !self.swapchain_stale {
            self.acquired = self.acquire_image(self.ring.index())?;
        }
        Ok(())
    }

    fn flush(&mut self) -> RenderResult<()> {
        if self.tracker.is_recording() {
            return Err(RenderError::InvalidPassTransition {
                action: "flush while recording",
                state: self.tracker.state(),
            });
        }
        self.ring.wait_all()?;
        for sync in &self.present_syncs {
            Self::wait_fence(&sync.in_flight, "present fence")?;
        }
        self.textures.collect_all();
        self.materials.collect_all();
        self.meshes.collect_all();
        self.environments.collect_all();
        self.viewports.collect_all();

        let command_buffers: Vec<vk::CommandBuffer> = (0..GraphicsLimits::COMMAND_RING_SIZE)
            .filter_map(|slot| self.ring.slot_mut(slot).take_command_buffer())
            .collect();
        self.command_pool.free(&command_buffers);
        Ok(())
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = self.gpu.device.device_wait_idle();
        }
        self.textures.clear();
        self.materials.clear();
        self.meshes.clear();
        self.environments.clear();
        self.viewports.clear();
        log::debug!("Vulkan backend destroyed");
    }
}
