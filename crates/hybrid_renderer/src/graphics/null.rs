//! Backend that records commands instead of talking to a GPU
//!
//! [`NullBackend`] runs the same validation, pass bookkeeping and command
//! ring as the Vulkan backend and appends what it would have recorded to a
//! [`Command`] log. Fences run on a simulated clock: a submission completes
//! `gpu_latency_ns` after it was made, and waiting on an unfinished fence
//! advances the clock. This makes frame pacing observable without a device.

use std::cell::Cell;
use std::rc::Rc;

use super::backend::GraphicsBackend;
use super::bake::{BakePlan, BakeStep};
use super::cascades::CascadeFit;
use super::components::{Camera, DirectionalLight, Geometry, Light, PointLight, Transform};
use super::desc::{
    EnvironmentDesc, MaterialDesc, MaterialFlags, PixelFormat, TextureDesc, TextureKind,
    TextureRegion, ViewportDesc,
};
use super::error::{RenderError, RenderResult};
use super::forward::ForwardQueue;
use super::frame::{CommandRing, FrameFence};
use super::handles::{
    EnvironmentHandle, MaterialHandle, MeshHandle, ResourceTable, TextureHandle, ViewportHandle,
};
use super::limits::GraphicsLimits;
use super::material_layout::MaterialLayout;
use super::pass::{PassKind, PassTracker};
use super::postprocess::{PostSource, PostprocessChain};
use super::uniforms::{LightUniform, ShadowUniform};
use super::viewport_layout::ViewportLayout;
use crate::assets::mesh::MeshData;
use crate::core::config::RendererConfig;
use crate::foundation::math::Vec3;

/// Postprocess effect with its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Antialiasing
    Fxaa,
    /// Sharpen by amount
    Sharpen(f32),
    /// Motion blur by strength
    MotionBlur(f32),
    /// Blur by radius
    Blur(f32),
    /// Outline with color and thickness
    Outline([f32; 3], f32),
}

/// What the backend recorded
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// BRDF lookup table baked at creation
    BakeBrdfLut {
        /// Table size
        size: u32,
    },
    /// One environment bake draw
    BakeDraw(BakeStep),
    /// Bake submission waited on before the next one
    BakeSubmit,
    /// Partial texture upload
    UpdateTexture {
        /// Texture written
        texture: TextureHandle,
        /// Region written
        region: TextureRegion,
    },
    /// Frame started after the slot's fence signalled
    Begin {
        /// Ring slot
        slot: usize,
        /// Simulated time once recording started
        at_ns: u64,
    },
    /// View started
    BeginDepth {
        /// Target viewport
        viewport: ViewportHandle,
    },
    /// Opaque gbuffer draw
    DrawDepth {
        /// Mesh
        mesh: MeshHandle,
        /// Material
        material: MaterialHandle,
        /// Level of detail drawn
        lod: u32,
    },
    /// Depth pass finished
    EndDepth,
    /// Cascade started
    BeginShadow {
        /// Cascade index
        cascade: u32,
    },
    /// Caster draw
    DrawShadow {
        /// Mesh
        mesh: MeshHandle,
        /// Level of detail drawn
        lod: u32,
    },
    /// Cascade finished
    EndShadow,
    /// Light buffer cleared and ambient lighting applied
    BeginLight,
    /// Point light accumulated
    AddPointLight,
    /// Directional light accumulated
    AddDirectionalLight,
    /// Light pass finished and the light uniform uploaded
    EndLight {
        /// Point lights published to forward shading
        point_lights: usize,
        /// Directional lights published to forward shading
        directional_lights: usize,
    },
    /// Light buffer composed into the forward image
    BeginForward,
    /// Skybox drawn
    Skybox {
        /// Environment sampled, `None` for the default one
        environment: Option<EnvironmentHandle>,
    },
    /// Forward shaded draw
    DrawForward {
        /// Mesh
        mesh: MeshHandle,
        /// Material
        material: MaterialHandle,
        /// Level of detail drawn
        lod: u32,
        /// Alpha blended
        translucent: bool,
    },
    /// Forward pass finished
    EndForward,
    /// Effect chain started
    BeginPostprocess,
    /// One effect step
    Effect {
        /// Effect drawn
        effect: Effect,
        /// Image read
        read: PostSource,
        /// Ping-pong image written
        write: usize,
    },
    /// Chain result tone-mapped into the viewport output
    Tonemap {
        /// Image tone-mapped
        source: PostSource,
    },
    /// Frame submitted
    Submit {
        /// Ring slot
        slot: usize,
        /// Simulated submission time
        at_ns: u64,
        /// Simulated completion time
        completes_at_ns: u64,
    },
    /// Viewport output shown
    Present {
        /// Viewport shown
        viewport: ViewportHandle,
    },
}

/// Ring slot with a fence on the simulated clock
#[derive(Debug)]
pub struct NullSlot {
    clock: Rc<Cell<u64>>,
    signal_at: Cell<u64>,
}

impl FrameFence for NullSlot {
    type Error = RenderError;

    fn wait(&self, timeout_ns: u64) -> RenderResult<()> {
        let now = self.clock.get();
        let signal_at = self.signal_at.get();
        if signal_at <= now {
            return Ok(());
        }
        if signal_at - now > timeout_ns {
            self.clock.set(now + timeout_ns);
            return Err(RenderError::Timeout {
                what: "frame fence",
                timeout_ns,
            });
        }
        self.clock.set(signal_at);
        Ok(())
    }

    fn reset(&self) -> RenderResult<()> {
        self.signal_at.set(u64::MAX);
        Ok(())
    }
}

struct NullMaterial {
    flags: MaterialFlags,
}

struct NullMesh {
    lod_count: u32,
}

/// Derived maps of a baked environment
#[derive(Debug, Clone)]
pub struct NullEnvironment {
    /// Source cube
    pub skybox: TextureHandle,
    /// Diffuse irradiance cube
    pub irradiance: TextureDesc,
    /// Prefiltered specular cube
    pub prefilter: TextureDesc,
}

struct ViewState {
    environment: Option<EnvironmentHandle>,
    cascades: CascadeFit,
}

/// Recording backend for tests and headless runs
pub struct NullBackend {
    config: RendererConfig,
    clock: Rc<Cell<u64>>,
    gpu_latency_ns: u64,
    cpu_frame_ns: u64,

    ring: CommandRing<NullSlot>,
    tracker: PassTracker,
    commands: Vec<Command>,

    textures: ResourceTable<TextureHandle, TextureDesc>,
    materials: ResourceTable<MaterialHandle, NullMaterial>,
    meshes: ResourceTable<MeshHandle, NullMesh>,
    environments: ResourceTable<EnvironmentHandle, NullEnvironment>,
    viewports: ResourceTable<ViewportHandle, ViewportLayout>,

    view: Option<ViewState>,
    forward_queue: ForwardQueue<Command>,
    post_chain: PostprocessChain,
    lights: LightUniform,
    shadow: ShadowUniform,
    pending_present: bool,
}

impl NullBackend {
    /// Backend whose submissions complete immediately
    pub fn new(config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        let clock = Rc::new(Cell::new(0));
        let slots = [(); GraphicsLimits::COMMAND_RING_SIZE].map(|()| NullSlot {
            clock: clock.clone(),
            signal_at: Cell::new(0),
        });
        let lut_size = config.ibl.brdf_lut_size;
        log::info!("Created null backend");

        Ok(Self {
            config,
            clock,
            gpu_latency_ns: 0,
            cpu_frame_ns: 0,
            ring: CommandRing::new(slots),
            tracker: PassTracker::new(),
            commands: vec![Command::BakeBrdfLut { size: lut_size }],
            textures: ResourceTable::new("texture"),
            materials: ResourceTable::new("material"),
            meshes: ResourceTable::new("mesh"),
            environments: ResourceTable::new("environment"),
            viewports: ResourceTable::new("viewport"),
            view: None,
            forward_queue: ForwardQueue::new(),
            post_chain: PostprocessChain::new(),
            lights: LightUniform::default(),
            shadow: ShadowUniform::default(),
            pending_present: false,
        })
    }

    /// Simulate a GPU that needs `gpu_latency_ns` per submission while the CPU spends `cpu_frame_ns` per frame
    pub fn with_timing(mut self, gpu_latency_ns: u64, cpu_frame_ns: u64) -> Self {
        self.gpu_latency_ns = gpu_latency_ns;
        self.cpu_frame_ns = cpu_frame_ns;
        self
    }

    /// Everything recorded so far
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Forget the recorded commands
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Simulated time in nanoseconds
    pub fn now_ns(&self) -> u64 {
        self.clock.get()
    }

    /// Pass bookkeeping
    pub fn tracker(&self) -> &PassTracker {
        &self.tracker
    }

    /// Description of a live texture
    pub fn texture(&self, texture: TextureHandle) -> RenderResult<&TextureDesc> {
        self.textures.get(texture)
    }

    /// Derived maps of a live environment
    pub fn environment(&self, environment: EnvironmentHandle) -> RenderResult<&NullEnvironment> {
        self.environments.get(environment)
    }

    /// Images of a live viewport
    pub fn viewport_layout(&self, viewport: ViewportHandle) -> RenderResult<&ViewportLayout> {
        self.viewports.get(viewport)
    }

    /// Lights published by the last light pass
    pub fn light_uniform(&self) -> &LightUniform {
        &self.lights
    }

    /// Cascades of the current view
    pub fn shadow_uniform(&self) -> &ShadowUniform {
        &self.shadow
    }

    /// Retired resources still waiting for their frame to complete
    pub fn retired_count(&self) -> usize {
        self.textures.retired_len()
            + self.materials.retired_len()
            + self.meshes.retired_len()
            + self.environments.retired_len()
            + self.viewports.retired_len()
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

    fn resolve_lod(&self, geometry: &Geometry, lod: u32) -> RenderResult<(MaterialFlags, u32)> {
        let mesh = self.meshes.get(geometry.mesh)?;
        let material = self.materials.get(geometry.material)?;
        Ok((material.flags, lod.min(mesh.lod_count - 1)))
    }

    fn effect(&mut self, call: &'static str, effect: Effect) -> RenderResult<()> {
        self.tracker.draw_effect(call)?;
        let (read, write) = self.post_chain.advance();
        self.commands.push(Command::Effect { effect, read, write });
        Ok(())
    }
}

impl GraphicsBackend for NullBackend {
    fn make_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle> {
        desc.validate()?;
        let mut stored = desc.clone();
        // pixel data lives on the GPU, only the description is kept
        stored.pixels = Vec::new();
        Ok(self.textures.insert(stored))
    }

    fn update_texture(
        &mut self,
        texture: TextureHandle,
        pixels: &[u8],
        region: TextureRegion,
    ) -> RenderResult<()> {
        self.textures.get(texture)?.check_update(pixels.len(), region)?;
        self.commands.push(Command::UpdateTexture { texture, region });
        Ok(())
    }

    fn make_material(&mut self, desc: &MaterialDesc) -> RenderResult<MaterialHandle> {
        desc.validate()?;
        for map in desc.maps.present() {
            self.textures.get(map)?;
        }
        let flags = desc.flags();
        log::trace!(
            "Material with {} map binding(s)",
            MaterialLayout::from_flags(flags).map_count()
        );
        Ok(self.materials.insert(NullMaterial { flags }))
    }

    fn make_mesh(&mut self, mesh: &MeshData) -> RenderResult<MeshHandle> {
        mesh.validate()?;
        Ok(self.meshes.insert(NullMesh {
            lod_count: mesh.lods.len() as u32,
        }))
    }

    fn make_environment(&mut self, desc: &EnvironmentDesc) -> RenderResult<EnvironmentHandle> {
        if self.textures.get(desc.skybox)?.kind != TextureKind::Cube {
            return Err(RenderError::NotACubemap);
        }
        let plan = BakePlan::from_config(&self.config.ibl);
        for step in plan.steps() {
            self.commands.push(Command::BakeDraw(*step));
            self.commands.push(Command::BakeSubmit);
        }

        let irradiance = TextureDesc::cube(plan.irradiance_size(), PixelFormat::Rgba16F).render_target();
        let prefilter = TextureDesc::cube(plan.prefilter_size(), PixelFormat::Rgba16F)
            .with_mips(plan.prefilter_mips())
            .render_target();
        log::info!("Baked environment with {} draws", plan.steps().len());

        Ok(self.environments.insert(NullEnvironment {
            skybox: desc.skybox,
            irradiance,
            prefilter,
        }))
    }

    fn make_viewport(&mut self, desc: &ViewportDesc) -> RenderResult<ViewportHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::InvalidViewport {
                width: desc.width,
                height: desc.height,
            });
        }
        Ok(self.viewports.insert(ViewportLayout::new(desc.width, desc.height)))
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
        Ok(self.meshes.get(mesh)?.lod_count)
    }

    fn material_translucent(&self, material: MaterialHandle) -> RenderResult<bool> {
        Ok(self.materials.get(material)?.flags.contains(MaterialFlags::TRANSLUCENT))
    }

    fn viewport_size(&self, viewport: ViewportHandle) -> RenderResult<(u32, u32)> {
        let layout = self.viewports.get(viewport)?;
        Ok((layout.width(), layout.height()))
    }

    fn begin(&mut self) -> RenderResult<()> {
        if self.tracker.is_recording() {
            // fails with the transition error without touching the ring
            return self.tracker.begin_frame();
        }
        self.ring.acquire()?;
        let slot = self.ring.index();
        self.collect(slot);
        self.tracker.begin_frame()?;
        self.view = None;
        self.commands.push(Command::Begin {
            slot,
            at_ns: self.clock.get(),
        });
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
        let layout = self.viewports.get(viewport)?;
        let aspect = layout.width() as f32 / layout.height() as f32;
        if let Some(environment) = camera.environment {
            self.environments.get(environment)?;
        }
        self.complete_pending(Some(PassKind::Depth))?;
        self.tracker.begin_pass(PassKind::Depth)?;

        self.view = Some(ViewState {
            environment: camera.environment,
            cascades: CascadeFit::new(camera_transform, camera, aspect, &self.config.shadows),
        });
        self.shadow.reset(self.config.shadows.map_size);
        self.lights.clear();
        self.commands.push(Command::BeginDepth { viewport });
        Ok(())
    }

    fn draw_depth(&mut self, _transform: &Transform, geometry: &Geometry, lod: u32) -> RenderResult<()> {
        self.tracker.require(PassKind::Depth, "draw_depth")?;
        let (flags, lod) = self.resolve_lod(geometry, lod)?;
        if flags.contains(MaterialFlags::TRANSLUCENT) {
            return Ok(());
        }
        self.commands.push(Command::DrawDepth {
            mesh: geometry.mesh,
            material: geometry.material,
            lod,
        });
        Ok(())
    }

    fn end_depth_pass(&mut self) -> RenderResult<()> {
        self.tracker.end_pass(PassKind::Depth)?;
        self.commands.push(Command::EndDepth);
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
        if let Some(view) = &self.view {
            let matrix = view.cascades.light_view_projection(cascade, &transform.forward());
            let (_, split) = view.cascades.slice(cascade);
            self.shadow.set_cascade(cascade, &matrix, split);
        }
        self.commands.push(Command::BeginShadow { cascade });
        Ok(())
    }

    fn draw_shadow(&mut self, _transform: &Transform, geometry: &Geometry, lod: u32) -> RenderResult<()> {
        self.tracker.require(PassKind::Shadow, "draw_shadow")?;
        let (_, lod) = self.resolve_lod(geometry, lod)?;
        self.commands.push(Command::DrawShadow {
            mesh: geometry.mesh,
            lod,
        });
        Ok(())
    }

    fn end_shadow_pass(&mut self) -> RenderResult<()> {
        self.tracker.end_pass(PassKind::Shadow)?;
        self.commands.push(Command::EndShadow);
        Ok(())
    }

    fn begin_light_pass(&mut self) -> RenderResult<()> {
        self.complete_pending(Some(PassKind::Light))?;
        self.tracker.begin_pass(PassKind::Light)?;
        self.lights.clear();
        self.commands.push(Command::BeginLight);
        Ok(())
    }

    fn add_point_light(&mut self, transform: &Transform, light: &Light, point: &PointLight) -> RenderResult<()> {
        self.tracker.require(PassKind::Light, "add_point_light")?;
        if self.lights.push_point(transform, light, point).is_none() {
            log::warn!("More than {} point lights, extra lights ignored", GraphicsLimits::MAX_POINT_LIGHTS);
            return Ok(());
        }
        self.commands.push(Command::AddPointLight);
        Ok(())
    }

    fn add_directional_light(
        &mut self,
        transform: &Transform,
        light: &Light,
        _directional: &DirectionalLight,
    ) -> RenderResult<()> {
        self.tracker.require(PassKind::Light, "add_directional_light")?;
        let casts = light.shadow_enabled && self.shadow.cascade_count() > 0;
        if self.lights.push_directional(transform, light, casts).is_none() {
            log::warn!(
                "More than {} directional lights, extra lights ignored",
                GraphicsLimits::MAX_DIRECTIONAL_LIGHTS
            );
            return Ok(());
        }
        self.commands.push(Command::AddDirectionalLight);
        Ok(())
    }

    fn end_light_pass(&mut self) -> RenderResult<()> {
        self.tracker.end_pass(PassKind::Light)?;
        self.commands.push(Command::EndLight {
            point_lights: self.lights.point_count(),
            directional_lights: self.lights.directional_count(),
        });
        Ok(())
    }

    fn begin_forward_pass(&mut self) -> RenderResult<()> {
        self.complete_pending(Some(PassKind::Forward))?;
        self.tracker.begin_pass(PassKind::Forward)?;
        self.forward_queue.clear();
        self.commands.push(Command::BeginForward);
        Ok(())
    }

    fn draw_skybox(&mut self) -> RenderResult<()> {
        self.tracker.require(PassKind::Forward, "draw_skybox")?;
        let environment = self.view.as_ref().and_then(|v| v.environment);
        self.commands.push(Command::Skybox { environment });
        Ok(())
    }

    fn draw_forward(&mut self, _transform: &Transform, geometry: &Geometry, lod: u32) -> RenderResult<()> {
        self.tracker.require(PassKind::Forward, "draw_forward")?;
        let (flags, lod) = self.resolve_lod(geometry, lod)?;
        let translucent = flags.contains(MaterialFlags::TRANSLUCENT);
        let draw = Command::DrawForward {
            mesh: geometry.mesh,
            material: geometry.material,
            lod,
            translucent,
        };
        if let Some(draw) = self.forward_queue.submit(draw, translucent) {
            self.commands.push(draw);
        }
        Ok(())
    }

    fn end_forward_pass(&mut self) -> RenderResult<()> {
        self.tracker.end_pass(PassKind::Forward)?;
        self.commands.extend(self.forward_queue.drain());
        self.commands.push(Command::EndForward);
        Ok(())
    }

    fn begin_postprocess_pass(&mut self) -> RenderResult<()> {
        self.complete_pending(Some(PassKind::Postprocess))?;
        self.tracker.begin_pass(PassKind::Postprocess)?;
        self.post_chain = PostprocessChain::new();
        self.commands.push(Command::BeginPostprocess);
        Ok(())
    }

    fn next_postprocess_pass(&mut self) -> RenderResult<()> {
        self.tracker.next_effect()
    }

    fn draw_fxaa(&mut self) -> RenderResult<()> {
        self.effect("draw_fxaa", Effect::Fxaa)
    }

    fn draw_sharpen(&mut self, amount: f32) -> RenderResult<()> {
        self.effect("draw_sharpen", Effect::Sharpen(amount))
    }

    fn draw_motion_blur(&mut self, strength: f32) -> RenderResult<()> {
        self.effect("draw_motion_blur", Effect::MotionBlur(strength))
    }

    fn draw_blur(&mut self, radius: f32) -> RenderResult<()> {
        self.effect("draw_blur", Effect::Blur(radius))
    }

    fn draw_outline(&mut self, color: Vec3, thickness: f32) -> RenderResult<()> {
        self.effect("draw_outline", Effect::Outline(color.into(), thickness))
    }

    fn end_postprocess_pass(&mut self) -> RenderResult<()> {
        self.tracker.end_pass(PassKind::Postprocess)?;
        self.commands.push(Command::Tonemap {
            source: self.post_chain.source(),
        });
        Ok(())
    }

    fn end(&mut self) -> RenderResult<()> {
        self.complete_pending(None)?;
        self.tracker.end_frame()?;

        let slot = self.ring.index();
        let at_ns = self.clock.get() + self.cpu_frame_ns;
        self.clock.set(at_ns);
        let completes_at_ns = at_ns + self.gpu_latency_ns;
        self.ring.arm()?;
        self.ring.current().signal_at.set(completes_at_ns);
        self.commands.push(Command::Submit {
            slot,
            at_ns,
            completes_at_ns,
        });

        self.ring.advance();
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
        self.viewports.get(viewport)?;
        self.pending_present = false;
        self.commands.push(Command::Present { viewport });
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
        self.textures.collect_all();
        self.materials.collect_all();
        self.meshes.collect_all();
        self.environments.collect_all();
        self.viewports.collect_all();
        Ok(())
    }
}
