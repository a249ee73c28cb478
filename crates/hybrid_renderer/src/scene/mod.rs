//! Reference driver for the pass protocol
//!
//! [`render_view`] walks a plain [`SceneView`] through
//! depth, shadow cascades, light, forward and postprocess on any
//! [`GraphicsBackend`]. It is what the viewer uses, and what callers with
//! their own scene representation can copy from.

use crate::assets::mesh::select_lod;
use crate::graphics::{
    Camera, DirectionalLight, Geometry, GraphicsBackend, GraphicsLimits, Light, PointLight,
    RenderResult, Transform, ViewportHandle,
};
use crate::foundation::math::Vec3;

/// Light type with its type-specific data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Omnidirectional light
    Point(PointLight),
    /// Sun-like light
    Directional(DirectionalLight),
}

/// A light placed in the world
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLight {
    /// World transform; directional lights shine along its forward axis
    pub transform: Transform,
    /// Shared light properties
    pub light: Light,
    /// Point or directional
    pub kind: LightKind,
}

impl SceneLight {
    /// Point light at `position`
    pub fn point(position: Vec3, light: Light, radius: f32) -> Self {
        Self {
            transform: Transform::from_position(position),
            light,
            kind: LightKind::Point(PointLight { radius }),
        }
    }

    /// Directional light shining along `transform`'s forward axis
    pub fn directional(transform: Transform, light: Light) -> Self {
        Self {
            transform,
            light,
            kind: LightKind::Directional(DirectionalLight),
        }
    }
}

/// A mesh instance
#[derive(Debug, Clone, PartialEq)]
pub struct Drawable {
    /// World transform
    pub transform: Transform,
    /// Mesh and material
    pub geometry: Geometry,
    /// Bounding sphere radius of the mesh in model space, drives LOD selection
    pub radius: f32,
    /// Rendered into shadow cascades
    pub casts_shadows: bool,
}

impl Drawable {
    /// Shadow casting instance
    pub fn new(transform: Transform, geometry: Geometry, radius: f32) -> Self {
        Self {
            transform,
            geometry,
            radius,
            casts_shadows: true,
        }
    }

    /// Level of detail when seen from `eye`
    pub fn lod(&self, eye: &Vec3, lod_count: u32) -> u32 {
        let scale = self.transform.scale.abs().max();
        let distance = (self.transform.position - eye).norm();
        select_lod(distance, self.radius * scale, lod_count)
    }
}

/// One postprocess step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostEffect {
    /// Antialiasing
    Fxaa,
    /// Sharpen by amount
    Sharpen(f32),
    /// Motion blur by strength
    MotionBlur(f32),
    /// Blur by radius in pixels
    Blur(f32),
    /// Depth edge outline with color and thickness
    Outline(Vec3, f32),
}

/// Everything one view draws
#[derive(Debug, Clone)]
pub struct SceneView {
    /// Target viewport
    pub viewport: ViewportHandle,
    /// Camera placement
    pub camera_transform: Transform,
    /// Camera projection and environment
    pub camera: Camera,
    /// Lights
    pub lights: Vec<SceneLight>,
    /// Mesh instances
    pub drawables: Vec<Drawable>,
    /// Postprocess chain in order
    pub effects: Vec<PostEffect>,
    /// Cascades rendered for the shadow caster
    pub shadow_cascades: u32,
    /// Draw the camera's environment behind everything
    pub skybox: bool,
}

impl SceneView {
    /// Empty view with every shadow cascade and a skybox
    pub fn new(viewport: ViewportHandle, camera_transform: Transform, camera: Camera) -> Self {
        Self {
            viewport,
            camera_transform,
            camera,
            lights: Vec::new(),
            drawables: Vec::new(),
            effects: Vec::new(),
            shadow_cascades: GraphicsLimits::MAX_SHADOW_CASCADES,
            skybox: true,
        }
    }

    /// Add a light
    pub fn with_light(mut self, light: SceneLight) -> Self {
        self.lights.push(light);
        self
    }

    /// Add a mesh instance
    pub fn with_drawable(mut self, drawable: Drawable) -> Self {
        self.drawables.push(drawable);
        self
    }

    /// Append a postprocess step
    pub fn with_effect(mut self, effect: PostEffect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Set the cascade count, clamped to what the renderer supports
    pub fn with_shadow_cascades(mut self, cascades: u32) -> Self {
        self.shadow_cascades = cascades.min(GraphicsLimits::MAX_SHADOW_CASCADES);
        self
    }
}

/// The directional light that renders shadows: the first one with shadows enabled
pub fn shadow_caster(lights: &[SceneLight]) -> Option<(&SceneLight, &DirectionalLight)> {
    lights.iter().find_map(|scene_light| match &scene_light.kind {
        LightKind::Directional(directional) if scene_light.light.shadow_enabled => {
            Some((scene_light, directional))
        }
        _ => None,
    })
}

/// Record every pass of `view` into the open frame
pub fn render_view<B: GraphicsBackend + ?Sized>(backend: &mut B, view: &SceneView) -> RenderResult<()> {
    let eye = view.camera_transform.position;
    let mut lods = Vec::with_capacity(view.drawables.len());
    let mut translucent = Vec::with_capacity(view.drawables.len());
    for drawable in &view.drawables {
        let lod_count = backend.mesh_lod_count(drawable.geometry.mesh)?;
        lods.push(drawable.lod(&eye, lod_count));
        translucent.push(backend.material_translucent(drawable.geometry.material)?);
    }

    // opaque geometry is lit by the light pass, translucent geometry by forward shading
    backend.begin_depth_pass(view.viewport, &view.camera_transform, &view.camera)?;
    for ((drawable, &lod), _) in view.drawables.iter().zip(&lods).zip(&translucent).filter(|&(_, &t)| !t) {
        backend.draw_depth(&drawable.transform, &drawable.geometry, lod)?;
    }
    backend.end_depth_pass()?;

    if let Some((caster, directional)) = shadow_caster(&view.lights) {
        for cascade in 0..view.shadow_cascades {
            backend.begin_shadow_pass(&caster.transform, &caster.light, directional, cascade)?;
            for (drawable, &lod) in view.drawables.iter().zip(&lods) {
                if drawable.casts_shadows {
                    backend.draw_shadow(&drawable.transform, &drawable.geometry, lod)?;
                }
            }
            backend.end_shadow_pass()?;
        }
    }

    backend.begin_light_pass()?;
    for scene_light in &view.lights {
        match &scene_light.kind {
            LightKind::Point(point) => {
                backend.add_point_light(&scene_light.transform, &scene_light.light, point)?;
            }
            LightKind::Directional(directional) => {
                backend.add_directional_light(&scene_light.transform, &scene_light.light, directional)?;
            }
        }
    }
    backend.end_light_pass()?;

    backend.begin_forward_pass()?;
    if view.skybox {
        backend.draw_skybox()?;
    }
    for ((drawable, &lod), _) in view.drawables.iter().zip(&lods).zip(&translucent).filter(|&(_, &t)| t) {
        backend.draw_forward(&drawable.transform, &drawable.geometry, lod)?;
    }
    backend.end_forward_pass()?;

    backend.begin_postprocess_pass()?;
    for effect in &view.effects {
        backend.next_postprocess_pass()?;
        match *effect {
            PostEffect::Fxaa => backend.draw_fxaa()?,
            PostEffect::Sharpen(amount) => backend.draw_sharpen(amount)?,
            PostEffect::MotionBlur(strength) => backend.draw_motion_blur(strength)?,
            PostEffect::Blur(radius) => backend.draw_blur(radius)?,
            PostEffect::Outline(color, thickness) => backend.draw_outline(color, thickness)?,
        }
    }
    backend.end_postprocess_pass()
}

/// One complete frame: `begin`, every view, `end`, then present `present_viewport`
pub fn render_frame<B: GraphicsBackend + ?Sized>(
    backend: &mut B,
    views: &[SceneView],
    present_viewport: ViewportHandle,
) -> RenderResult<()> {
    backend.begin()?;
    for view in views {
        render_view(backend, view)?;
    }
    backend.end()?;
    backend.present(present_viewport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::mesh::{MeshBuildOptions, MeshData, Vertex};
    use crate::core::config::RendererConfig;
    use crate::graphics::null::{Command, NullBackend};
    use crate::graphics::{MaterialDesc, ViewportDesc};

    fn sun(shadows: bool) -> SceneLight {
        SceneLight::directional(
            Transform::looking_at(Vec3::new(0.0, 10.0, 0.0), Vec3::zeros(), Vec3::z()),
            Light {
                shadow_enabled: shadows,
                ..Light::default()
            },
        )
    }

    fn grid(size: u32) -> MeshData {
        let mut vertices = Vec::new();
        for y in 0..=size {
            for x in 0..=size {
                let (u, v) = (x as f32 / size as f32, y as f32 / size as f32);
                let height = (u * 6.0).sin() * (v * 5.0).cos() * 0.2;
                vertices.push(Vertex::new([u, height, v], [u, v], [0.0, 1.0, 0.0]));
            }
        }
        let mut indices = Vec::new();
        let stride = size + 1;
        for y in 0..size {
            for x in 0..size {
                let i = y * stride + x;
                indices.extend_from_slice(&[i, i + stride, i + 1, i + 1, i + stride, i + stride + 1]);
            }
        }
        MeshData::build(vertices, indices, &MeshBuildOptions::default()).unwrap()
    }

    fn scene(backend: &mut NullBackend) -> SceneView {
        let mesh = grid(32);
        let radius = mesh.bounding_sphere.radius;
        let mesh = backend.make_mesh(&mesh).unwrap();
        let material = backend.make_material(&MaterialDesc::default()).unwrap();
        let viewport = backend.make_viewport(&ViewportDesc::new(640, 480)).unwrap();
        let geometry = Geometry { mesh, material };

        SceneView::new(
            viewport,
            Transform::from_position(Vec3::new(0.0, 1.0, 3.0)),
            Camera::default(),
        )
        .with_drawable(Drawable::new(Transform::identity(), geometry, radius))
        .with_drawable(Drawable::new(
            Transform::from_position(Vec3::new(0.0, 0.0, -500.0)),
            geometry,
            radius,
        ))
    }

    #[test]
    fn test_shadow_caster_is_first_enabled_directional() {
        let lights = vec![
            SceneLight::point(Vec3::zeros(), Light { shadow_enabled: true, ..Light::default() }, 5.0),
            sun(false),
            sun(true),
            sun(true),
        ];
        let (caster, _) = shadow_caster(&lights).unwrap();
        assert!(std::ptr::eq(caster, &lights[2]));
        assert!(shadow_caster(&lights[..2]).is_none());
    }

    #[test]
    fn test_render_frame_runs_every_pass() {
        let mut backend = NullBackend::new(RendererConfig::default()).unwrap();
        let view = scene(&mut backend)
            .with_light(sun(true))
            .with_light(SceneLight::point(Vec3::new(1.0, 2.0, 0.0), Light::default(), 4.0))
            .with_effect(PostEffect::Fxaa)
            .with_effect(PostEffect::Sharpen(0.5));
        backend.clear_commands();

        render_frame(&mut backend, std::slice::from_ref(&view), view.viewport).unwrap();

        let commands = backend.commands();
        let shadows = commands.iter().filter(|c| matches!(c, Command::BeginShadow { .. })).count();
        assert_eq!(shadows, GraphicsLimits::MAX_SHADOW_CASCADES as usize);
        assert!(commands.contains(&Command::EndLight {
            point_lights: 1,
            directional_lights: 1
        }));
        let effects = commands.iter().filter(|c| matches!(c, Command::Effect { .. })).count();
        assert_eq!(effects, 2);
        assert!(matches!(commands.last(), Some(Command::Present { .. })));
    }

    #[test]
    fn test_each_drawable_is_lit_by_one_path() {
        let mut backend = NullBackend::new(RendererConfig::default()).unwrap();
        let view = scene(&mut backend);
        let glass = backend
            .make_material(&MaterialDesc {
                translucent: true,
                ..MaterialDesc::default()
            })
            .unwrap();
        let glass = Geometry {
            mesh: view.drawables[0].geometry.mesh,
            material: glass,
        };
        let view = view.with_drawable(Drawable::new(Transform::identity(), glass, 1.0));
        backend.clear_commands();

        render_frame(&mut backend, std::slice::from_ref(&view), view.viewport).unwrap();

        let commands = backend.commands();
        let gbuffer: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawDepth { material, .. } => Some(*material),
                _ => None,
            })
            .collect();
        let forward: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawForward { material, translucent, .. } => Some((*material, *translucent)),
                _ => None,
            })
            .collect();
        assert_eq!(gbuffer.len(), 2);
        assert!(gbuffer.iter().all(|m| *m != glass.material));
        assert_eq!(forward, vec![(glass.material, true)]);
    }

    #[test]
    fn test_distant_drawables_use_coarser_lods() {
        let mut backend = NullBackend::new(RendererConfig::default()).unwrap();
        let view = scene(&mut backend);
        assert!(backend.mesh_lod_count(view.drawables[0].geometry.mesh).unwrap() > 1);
        backend.clear_commands();

        backend.begin().unwrap();
        render_view(&mut backend, &view).unwrap();
        backend.end().unwrap();

        let lods: Vec<u32> = backend
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::DrawDepth { lod, .. } => Some(*lod),
                _ => None,
            })
            .collect();
        assert_eq!(lods.len(), 2);
        assert_eq!(lods[0], 0);
        assert!(lods[1] > 0);
    }

    #[test]
    fn test_no_shadow_pass_without_caster() {
        let mut backend = NullBackend::new(RendererConfig::default()).unwrap();
        let view = scene(&mut backend).with_light(sun(false));
        backend.begin().unwrap();
        render_view(&mut backend, &view).unwrap();
        backend.end().unwrap();
        assert!(!backend.commands().iter().any(|c| matches!(c, Command::BeginShadow { .. })));
    }
}
