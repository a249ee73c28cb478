//! Procedural content for the viewer: meshes, materials and a gradient sky

use std::f32::consts::PI;

use hybrid_renderer::assets::{MeshBuildOptions, MeshData, ObjLoader, Vertex};
use hybrid_renderer::foundation::math::{Transform, Vec3};
use hybrid_renderer::graphics::desc::{PixelFormat, TextureDesc};
use hybrid_renderer::graphics::{
    Camera, EnvironmentDesc, EnvironmentHandle, Geometry, GraphicsBackend, Light, MaterialDesc,
    RenderResult, ViewportHandle,
};
use hybrid_renderer::scene::{Drawable, PostEffect, SceneLight, SceneView};

use crate::ViewerError;

const SKY_SIZE: u32 = 64;

/// UV sphere, dense enough for the simplifier to produce several LODs
pub fn sphere(rings: u32, segments: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let theta = v * PI;
        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let phi = u * 2.0 * PI;
            let normal = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
            vertices.push(Vertex::new(normal, [u, v], normal));
        }
    }

    let stride = segments + 1;
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for ring in 0..rings {
        for segment in 0..segments {
            let i = ring * stride + segment;
            indices.extend_from_slice(&[i, i + 1, i + stride, i + 1, i + stride + 1, i + stride]);
        }
    }
    (vertices, indices)
}

/// Flat square on the XZ plane facing up
pub fn plane(size: f32, divisions: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    for z in 0..=divisions {
        for x in 0..=divisions {
            let (u, v) = (x as f32 / divisions as f32, z as f32 / divisions as f32);
            vertices.push(Vertex::new(
                [(u - 0.5) * size, 0.0, (v - 0.5) * size],
                [u * size, v * size],
                [0.0, 1.0, 0.0],
            ));
        }
    }
    let stride = divisions + 1;
    let mut indices = Vec::new();
    for z in 0..divisions {
        for x in 0..divisions {
            let i = z * stride + x;
            indices.extend_from_slice(&[i, i + stride, i + 1, i + 1, i + stride, i + stride + 1]);
        }
    }
    (vertices, indices)
}

/// Unit cube with per-face normals
pub fn cube() -> (Vec<Vertex>, Vec<u32>) {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, right, up) in faces {
        let base = vertices.len() as u32;
        for (s, t) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = [
                (normal[0] + right[0] * s + up[0] * t) * 0.5,
                (normal[1] + right[1] * s + up[1] * t) * 0.5,
                (normal[2] + right[2] * s + up[2] * t) * 0.5,
            ];
            vertices.push(Vertex::new(position, [(s + 1.0) * 0.5, (1.0 - t) * 0.5], normal));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

/// Horizon-to-zenith gradient, one face at a time in +X -X +Y -Y +Z -Z order
pub fn sky_faces(size: u32) -> [Vec<u8>; 6] {
    let zenith = Vec3::new(0.18, 0.32, 0.62);
    let horizon = Vec3::new(0.75, 0.82, 0.92);
    let ground = Vec3::new(0.22, 0.2, 0.18);

    std::array::from_fn(|face| {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let s = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                let t = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                let direction = match face {
                    0 => Vec3::new(1.0, -t, -s),
                    1 => Vec3::new(-1.0, -t, s),
                    2 => Vec3::new(s, 1.0, t),
                    3 => Vec3::new(s, -1.0, -t),
                    4 => Vec3::new(s, -t, 1.0),
                    _ => Vec3::new(-s, -t, -1.0),
                }
                .normalize();
                let color = if direction.y >= 0.0 {
                    horizon.lerp(&zenith, direction.y.sqrt())
                } else {
                    horizon.lerp(&ground, (-direction.y).sqrt().min(1.0))
                };
                pixels.extend_from_slice(&[
                    (color.x * 255.0) as u8,
                    (color.y * 255.0) as u8,
                    (color.z * 255.0) as u8,
                    255,
                ]);
            }
        }
        pixels
    })
}

/// Handles of everything the demo scene draws
pub struct DemoScene {
    pub environment: EnvironmentHandle,
    ground: Drawable,
    spheres: Vec<Drawable>,
    glass: Drawable,
    model: Option<Drawable>,
}

impl DemoScene {
    /// Upload meshes, materials and the sky environment
    pub fn create<B: GraphicsBackend>(backend: &mut B, model_path: Option<&str>) -> Result<Self, ViewerError> {
        let options = MeshBuildOptions::default();

        let sky = TextureDesc::cube_from_faces(SKY_SIZE, PixelFormat::Rgba8Srgb, &sky_faces(SKY_SIZE))?
            .with_full_mip_chain();
        let sky = backend.make_texture(&sky)?;
        let environment = backend.make_environment(&EnvironmentDesc { skybox: sky })?;

        let (vertices, indices) = plane(40.0, 32);
        let ground_mesh = MeshData::build(vertices, indices, &options)?;
        let ground_material = backend.make_material(&MaterialDesc {
            base_color: [0.45, 0.45, 0.42, 1.0],
            roughness: 0.9,
            ..MaterialDesc::default()
        })?;
        let ground = Drawable::new(
            Transform::identity(),
            Geometry {
                mesh: backend.make_mesh(&ground_mesh)?,
                material: ground_material,
            },
            ground_mesh.bounding_sphere.radius,
        );

        let (vertices, indices) = sphere(48, 96);
        let sphere_mesh = MeshData::build(vertices, indices, &options)?;
        log::info!("Sphere mesh has {} LODs", sphere_mesh.lods.len());
        let sphere_handle = backend.make_mesh(&sphere_mesh)?;
        let mut spheres = Vec::new();
        for i in 0..5 {
            let material = backend.make_material(&MaterialDesc {
                base_color: [0.9, 0.55, 0.2, 1.0],
                roughness: 0.1 + 0.2 * i as f32,
                metallic: if i % 2 == 0 { 1.0 } else { 0.0 },
                ..MaterialDesc::default()
            })?;
            spheres.push(Drawable::new(
                Transform::from_position(Vec3::new(-6.0 + 3.0 * i as f32, 1.0, 0.0)),
                Geometry {
                    mesh: sphere_handle,
                    material,
                },
                sphere_mesh.bounding_sphere.radius,
            ));
        }

        let (vertices, indices) = cube();
        let cube_mesh = MeshData::build(vertices, indices, &options)?;
        let glass_material = backend.make_material(&MaterialDesc {
            base_color: [0.3, 0.7, 0.9, 0.35],
            roughness: 0.05,
            translucent: true,
            double_sided: true,
            ..MaterialDesc::default()
        })?;
        let mut glass = Drawable::new(
            Transform::from_position(Vec3::new(0.0, 1.5, 3.5)),
            Geometry {
                mesh: backend.make_mesh(&cube_mesh)?,
                material: glass_material,
            },
            cube_mesh.bounding_sphere.radius * 2.0,
        );
        glass.transform.scale = Vec3::new(2.0, 2.0, 2.0);
        glass.casts_shadows = false;

        let model = match model_path {
            Some(path) => {
                let obj = ObjLoader::load_obj(path)?;
                let mesh = MeshData::build(obj.vertices, obj.indices, &options)?;
                log::info!("Loaded {path}: {} vertices, {} LODs", mesh.vertices.len(), mesh.lods.len());
                let material = backend.make_material(&MaterialDesc {
                    base_color: [0.8, 0.8, 0.8, 1.0],
                    roughness: 0.4,
                    ..MaterialDesc::default()
                })?;
                Some(Drawable::new(
                    Transform::from_position(Vec3::new(0.0, 0.0, -4.0)),
                    Geometry {
                        mesh: backend.make_mesh(&mesh)?,
                        material,
                    },
                    mesh.bounding_sphere.radius,
                ))
            }
            None => None,
        };

        Ok(Self {
            environment,
            ground,
            spheres,
            glass,
            model,
        })
    }

    /// The scene at `time` seconds, seen through `viewport`
    pub fn view(&self, viewport: ViewportHandle, time: f32, effects: &[PostEffect]) -> SceneView {
        let orbit = time * 0.15;
        let eye = Vec3::new(orbit.sin() * 14.0, 5.0, orbit.cos() * 14.0);
        let camera_transform = Transform::looking_at(eye, Vec3::new(0.0, 1.0, 0.0), Vec3::y());
        let camera = Camera::default().with_fov_degrees(55.0).with_environment(self.environment);

        let sun = SceneLight::directional(
            Transform::looking_at(Vec3::new(8.0, 12.0, 6.0), Vec3::zeros(), Vec3::y()),
            Light {
                color: Vec3::new(1.0, 0.95, 0.85),
                intensity: 3.0,
                shadow_enabled: true,
            },
        );

        let mut view = SceneView::new(viewport, camera_transform, camera)
            .with_light(sun)
            .with_drawable(self.ground.clone())
            .with_drawable(self.glass.clone());

        for (i, color) in [Vec3::new(1.0, 0.3, 0.2), Vec3::new(0.2, 0.5, 1.0)].into_iter().enumerate() {
            let angle = time + i as f32 * PI;
            view = view.with_light(SceneLight::point(
                Vec3::new(angle.cos() * 5.0, 2.0, angle.sin() * 5.0),
                Light {
                    color,
                    intensity: 20.0,
                    shadow_enabled: false,
                },
                8.0,
            ));
        }

        for sphere in &self.spheres {
            let mut sphere = sphere.clone();
            sphere.transform.position.y = 1.0 + (time + sphere.transform.position.x).sin().abs() * 0.5;
            view = view.with_drawable(sphere);
        }
        if let Some(model) = &self.model {
            view = view.with_drawable(model.clone());
        }
        for effect in effects {
            view = view.with_effect(*effect);
        }
        view
    }
}

/// Keep the view's viewport at the window size; returns `false` while minimized
pub fn ensure_viewport<B: GraphicsBackend>(
    backend: &mut B,
    viewport: &mut Option<ViewportHandle>,
    width: u32,
    height: u32,
) -> RenderResult<bool> {
    if width == 0 || height == 0 {
        return Ok(false);
    }
    if let Some(current) = *viewport {
        if backend.viewport_size(current)? == (width, height) {
            return Ok(true);
        }
        backend.destroy_viewport(current)?;
    }
    *viewport = Some(backend.make_viewport(&hybrid_renderer::graphics::ViewportDesc::new(width, height))?);
    log::info!("Viewport resized to {width}x{height}");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_has_closed_faces() {
        let (vertices, indices) = cube();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn test_sphere_vertices_lie_on_unit_sphere() {
        let (vertices, indices) = sphere(8, 16);
        assert_eq!(indices.len(), 8 * 16 * 6);
        for vertex in &vertices {
            let p = Vec3::from(vertex.position);
            assert!((p.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sky_faces_fill_rgba8() {
        let faces = sky_faces(4);
        assert!(faces.iter().all(|face| face.len() == 4 * 4 * 4));
        // zenith face is bluer than the horizon
        assert!(faces[2][2] > faces[2][0]);
    }
}
