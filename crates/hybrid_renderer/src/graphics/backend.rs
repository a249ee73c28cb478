//! Backend abstraction trait for the renderer
//!
//! A frame is recorded between [`GraphicsBackend::begin`] and
//! [`GraphicsBackend::end`] and shown with [`GraphicsBackend::present`].
//! Inside a frame each view runs the passes in order:
//!
//! ```text
//! depth -> shadow (per cascade) -> light -> forward -> postprocess
//! ```
//!
//! Every call checks the pass state first and fails with
//! [`RenderError::InvalidPassTransition`](super::RenderError::InvalidPassTransition)
//! or [`RenderError::DrawOutsidePass`](super::RenderError::DrawOutsidePass)
//! without recording anything.

use super::components::{Camera, DirectionalLight, Geometry, Light, PointLight, Transform};
use super::desc::{EnvironmentDesc, MaterialDesc, TextureDesc, TextureRegion, ViewportDesc};
use super::error::RenderResult;
use super::handles::{EnvironmentHandle, MaterialHandle, MeshHandle, TextureHandle, ViewportHandle};
use crate::assets::mesh::MeshData;
use crate::foundation::math::Vec3;

/// A renderer implementation
pub trait GraphicsBackend {
    // === Resource factories ===

    /// Allocate and upload a texture
    fn make_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle>;

    /// Overwrite a region of a mutable texture's base level
    fn update_texture(
        &mut self,
        texture: TextureHandle,
        pixels: &[u8],
        region: TextureRegion,
    ) -> RenderResult<()>;

    /// Create a material; referenced textures must be alive
    fn make_material(&mut self, desc: &MaterialDesc) -> RenderResult<MaterialHandle>;

    /// Upload a mesh with its LODs
    fn make_mesh(&mut self, mesh: &MeshData) -> RenderResult<MeshHandle>;

    /// Bake an environment from a cube texture, blocking until every bake draw finished
    fn make_environment(&mut self, desc: &EnvironmentDesc) -> RenderResult<EnvironmentHandle>;

    /// Allocate the intermediate images of one output
    fn make_viewport(&mut self, desc: &ViewportDesc) -> RenderResult<ViewportHandle>;

    /// Release a texture once no in-flight frame uses it
    fn destroy_texture(&mut self, texture: TextureHandle) -> RenderResult<()>;

    /// Release a material once no in-flight frame uses it
    fn destroy_material(&mut self, material: MaterialHandle) -> RenderResult<()>;

    /// Release a mesh once no in-flight frame uses it
    fn destroy_mesh(&mut self, mesh: MeshHandle) -> RenderResult<()>;

    /// Release an environment once no in-flight frame uses it
    fn destroy_environment(&mut self, environment: EnvironmentHandle) -> RenderResult<()>;

    /// Release a viewport once no in-flight frame uses it
    fn destroy_viewport(&mut self, viewport: ViewportHandle) -> RenderResult<()>;

    /// LODs stored for a mesh
    fn mesh_lod_count(&self, mesh: MeshHandle) -> RenderResult<u32>;

    /// Whether a material is alpha blended, and so skipped by the depth pass
    fn material_translucent(&self, material: MaterialHandle) -> RenderResult<bool>;

    /// Size of a viewport
    fn viewport_size(&self, viewport: ViewportHandle) -> RenderResult<(u32, u32)>;

    // === Frame ===

    /// Wait for the next command slot and start recording
    fn begin(&mut self) -> RenderResult<()>;

    /// Slot of the command ring the next `begin` records into
    fn command_index(&self) -> usize;

    // === Depth pass ===

    /// Start a view: fill the gbuffer and depth of `viewport` as seen from the camera
    fn begin_depth_pass(
        &mut self,
        viewport: ViewportHandle,
        camera_transform: &Transform,
        camera: &Camera,
    ) -> RenderResult<()>;

    /// Draw opaque geometry into the gbuffer; translucent materials are skipped
    fn draw_depth(&mut self, transform: &Transform, geometry: &Geometry, lod: u32) -> RenderResult<()>;

    /// Finish the depth pass
    fn end_depth_pass(&mut self) -> RenderResult<()>;

    // === Shadow pass ===

    /// Render one cascade of the shadow casting directional light
    fn begin_shadow_pass(
        &mut self,
        transform: &Transform,
        light: &Light,
        directional: &DirectionalLight,
        cascade: u32,
    ) -> RenderResult<()>;

    /// Draw a caster into the current cascade
    fn draw_shadow(&mut self, transform: &Transform, geometry: &Geometry, lod: u32) -> RenderResult<()>;

    /// Finish the cascade
    fn end_shadow_pass(&mut self) -> RenderResult<()>;

    // === Light pass ===

    /// Apply ambient image based lighting and start accumulating lights
    fn begin_light_pass(&mut self) -> RenderResult<()>;

    /// Accumulate a point light
    fn add_point_light(&mut self, transform: &Transform, light: &Light, point: &PointLight) -> RenderResult<()>;

    /// Accumulate a directional light
    fn add_directional_light(
        &mut self,
        transform: &Transform,
        light: &Light,
        directional: &DirectionalLight,
    ) -> RenderResult<()>;

    /// Finish accumulation and publish the lights to forward shading
    fn end_light_pass(&mut self) -> RenderResult<()>;

    // === Forward pass ===

    /// Compose the lit gbuffer into the forward image
    fn begin_forward_pass(&mut self) -> RenderResult<()>;

    /// Draw the camera's environment behind everything
    fn draw_skybox(&mut self) -> RenderResult<()>;

    /// Forward shade geometry; translucent draws are recorded at the end of the pass
    ///
    /// Opaque geometry already drawn in this view's depth pass is lit by the
    /// light pass and should not be drawn here again.
    fn draw_forward(&mut self, transform: &Transform, geometry: &Geometry, lod: u32) -> RenderResult<()>;

    /// Record deferred translucent draws and finish the pass
    fn end_forward_pass(&mut self) -> RenderResult<()>;

    // === Postprocess pass ===

    /// Start the effect chain on the forward image
    fn begin_postprocess_pass(&mut self) -> RenderResult<()>;

    /// Flip the ping-pong pair; exactly one effect must follow
    fn next_postprocess_pass(&mut self) -> RenderResult<()>;

    /// Fast approximate antialiasing
    fn draw_fxaa(&mut self) -> RenderResult<()>;

    /// Unsharp mask
    fn draw_sharpen(&mut self, amount: f32) -> RenderResult<()>;

    /// Camera motion blur from the previous view-projection
    fn draw_motion_blur(&mut self, strength: f32) -> RenderResult<()>;

    /// Box blur
    fn draw_blur(&mut self, radius: f32) -> RenderResult<()>;

    /// Depth discontinuity outline
    fn draw_outline(&mut self, color: Vec3, thickness: f32) -> RenderResult<()>;

    /// Tone map the chain's result into the viewport's output
    fn end_postprocess_pass(&mut self) -> RenderResult<()>;

    // === Finish ===

    /// Complete the current view and submit the frame
    fn end(&mut self) -> RenderResult<()>;

    /// Show a viewport's output rendered in the last submitted frame
    fn present(&mut self, viewport: ViewportHandle) -> RenderResult<()>;

    /// Wait for all work, then release retired resources and command buffers
    fn flush(&mut self) -> RenderResult<()>;
}
