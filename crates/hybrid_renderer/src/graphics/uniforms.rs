//! GPU-visible per-frame and per-draw data
//!
//! Layouts follow std140 for uniform blocks and std430-compatible packing for
//! push constants. Matrices are stored column-major as `[[f32; 4]; 4]`.

use super::components::{Camera, Light, PointLight, Transform};
use super::desc::MaterialDesc;
use super::limits::GraphicsLimits;
use crate::foundation::math::{perspective, Mat4, Vec3};

/// Column-major matrix as uploaded to the GPU
pub type GpuMat4 = [[f32; 4]; 4];

fn gpu(matrix: &Mat4) -> GpuMat4 {
    (*matrix).into()
}

/// Camera uniform data, updated once per view
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct CameraUniform {
    /// World to view
    pub view: GpuMat4,
    /// View to clip
    pub projection: GpuMat4,
    /// World to clip
    pub view_projection: GpuMat4,
    /// Clip to world, used to rebuild positions from depth
    pub inverse_view_projection: GpuMat4,
    /// Last frame's world to clip, for motion blur
    pub previous_view_projection: GpuMat4,
    /// Camera position (w unused)
    pub position: [f32; 4],
    /// near, far, viewport width, viewport height
    pub clip: [f32; 4],
}

impl CameraUniform {
    /// Build from the camera placement and the target size
    pub fn new(
        transform: &Transform,
        camera: &Camera,
        width: u32,
        height: u32,
        previous_view_projection: Option<&Mat4>,
    ) -> Self {
        let aspect = width as f32 / height.max(1) as f32;
        let view = transform.view_matrix();
        let projection = perspective(camera.fov_y, aspect, camera.near, camera.far);
        let view_projection = projection * view;
        let inverse = view_projection.try_inverse().unwrap_or_else(Mat4::identity);
        let previous = previous_view_projection.copied().unwrap_or(view_projection);

        Self {
            view: gpu(&view),
            projection: gpu(&projection),
            view_projection: gpu(&view_projection),
            inverse_view_projection: gpu(&inverse),
            previous_view_projection: gpu(&previous),
            position: [transform.position.x, transform.position.y, transform.position.z, 1.0],
            clip: [camera.near, camera.far, width as f32, height as f32],
        }
    }

    /// World to clip as a math matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        Mat4::from(self.view_projection)
    }
}

/// Point light as seen by shaders
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default)]
pub struct PointLightData {
    /// xyz position, w radius
    pub position_radius: [f32; 4],
    /// rgb radiance, w unused
    pub color: [f32; 4],
}

/// Directional light as seen by shaders
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionalLightData {
    /// xyz direction the light travels, w is 1 when the light owns the shadow cascades
    pub direction: [f32; 4],
    /// rgb radiance, w unused
    pub color: [f32; 4],
}

/// Lights of one view, read by forward shading
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct LightUniform {
    /// point count, directional count, unused, unused
    pub counts: [u32; 4],
    /// Point lights
    pub point: [PointLightData; GraphicsLimits::MAX_POINT_LIGHTS],
    /// Directional lights
    pub directional: [DirectionalLightData; GraphicsLimits::MAX_DIRECTIONAL_LIGHTS],
}

impl Default for LightUniform {
    fn default() -> Self {
        Self {
            counts: [0; 4],
            point: [PointLightData::default(); GraphicsLimits::MAX_POINT_LIGHTS],
            directional: [DirectionalLightData::default(); GraphicsLimits::MAX_DIRECTIONAL_LIGHTS],
        }
    }
}

impl LightUniform {
    /// Drop every light
    pub fn clear(&mut self) {
        self.counts = [0; 4];
    }

    /// Number of point lights collected
    pub fn point_count(&self) -> usize {
        self.counts[0] as usize
    }

    /// Number of directional lights collected
    pub fn directional_count(&self) -> usize {
        self.counts[1] as usize
    }

    /// Append a point light; returns the packed data, or `None` when the array is full
    pub fn push_point(
        &mut self,
        transform: &Transform,
        light: &Light,
        point: &PointLight,
    ) -> Option<PointLightData> {
        let index = self.point_count();
        if index >= GraphicsLimits::MAX_POINT_LIGHTS {
            return None;
        }
        let radiance = light.radiance();
        let p = transform.position;
        let data = PointLightData {
            position_radius: [p.x, p.y, p.z, point.radius],
            color: [radiance.x, radiance.y, radiance.z, 0.0],
        };
        self.point[index] = data;
        self.counts[0] += 1;
        Some(data)
    }

    /// Append a directional light; returns the packed data, or `None` when the array is full
    pub fn push_directional(
        &mut self,
        transform: &Transform,
        light: &Light,
        casts_shadows: bool,
    ) -> Option<DirectionalLightData> {
        let index = self.directional_count();
        if index >= GraphicsLimits::MAX_DIRECTIONAL_LIGHTS {
            return None;
        }
        let radiance = light.radiance();
        let d = transform.forward().try_normalize(f32::EPSILON).unwrap_or_else(|| -Vec3::y());
        let data = DirectionalLightData {
            direction: [d.x, d.y, d.z, if casts_shadows { 1.0 } else { 0.0 }],
            color: [radiance.x, radiance.y, radiance.z, 0.0],
        };
        self.directional[index] = data;
        self.counts[1] += 1;
        Some(data)
    }
}

/// Cascaded shadow data of one view
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct ShadowUniform {
    /// World to light clip per cascade
    pub cascades: [GpuMat4; GraphicsLimits::MAX_SHADOW_CASCADES as usize],
    /// Far view depth of each cascade
    pub splits: [f32; 4],
    /// cascade count, map size, depth bias, unused
    pub params: [f32; 4],
}

impl Default for ShadowUniform {
    fn default() -> Self {
        Self {
            cascades: [gpu(&Mat4::identity()); GraphicsLimits::MAX_SHADOW_CASCADES as usize],
            splits: [0.0; 4],
            params: [0.0; 4],
        }
    }
}

impl ShadowUniform {
    /// Disable shadowing for a new view
    pub fn reset(&mut self, map_size: u32) {
        self.params = [0.0, map_size as f32, 0.005, 0.0];
    }

    /// Record the matrix and far split of `cascade`, one more rendered cascade
    pub fn set_cascade(&mut self, cascade: u32, view_projection: &Mat4, split: f32) {
        let index = cascade as usize;
        self.cascades[index] = gpu(view_projection);
        self.splits[index] = split;
        self.params[0] += 1.0;
    }

    /// Cascades rendered since the last reset
    pub fn cascade_count(&self) -> u32 {
        self.params[0] as u32
    }
}

/// Per-draw push constants of geometry passes
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ObjectPush {
    /// Object to world
    pub model: GpuMat4,
}

impl ObjectPush {
    /// From a world transform
    pub fn new(transform: &Transform) -> Self {
        Self {
            model: gpu(&transform.to_matrix()),
        }
    }
}

/// Per-draw push constants of the shadow pass
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ShadowPush {
    /// Object to light clip
    pub model_view_projection: GpuMat4,
}

impl ShadowPush {
    /// Combine a cascade matrix with an object transform
    pub fn new(cascade: &Mat4, transform: &Transform) -> Self {
        Self {
            model_view_projection: gpu(&(cascade * transform.to_matrix())),
        }
    }
}

/// Push constants of the deferred light shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct LightPush {
    /// Point: xyz position and w radius. Directional: xyz direction and w shadow flag
    pub position_or_direction: [f32; 4],
    /// rgb radiance
    pub color: [f32; 4],
}

impl From<PointLightData> for LightPush {
    fn from(light: PointLightData) -> Self {
        Self {
            position_or_direction: light.position_radius,
            color: light.color,
        }
    }
}

impl From<DirectionalLightData> for LightPush {
    fn from(light: DirectionalLightData) -> Self {
        Self {
            position_or_direction: light.direction,
            color: light.color,
        }
    }
}

/// Scalars of a material, std140
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialUniform {
    /// Linear base color and alpha
    pub base_color: [f32; 4],
    /// roughness, metallic, occlusion strength, unused
    pub params: [f32; 4],
    /// Material flag bits, unused, unused, unused
    pub flags: [u32; 4],
}

impl From<&MaterialDesc> for MaterialUniform {
    fn from(desc: &MaterialDesc) -> Self {
        Self {
            base_color: desc.base_color,
            params: [desc.roughness, desc.metallic, desc.occlusion_strength, 0.0],
            flags: [desc.flags().bits(), 0, 0, 0],
        }
    }
}

/// Push constants of the environment bake
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct BakePush {
    /// Cube face being rendered
    pub face: u32,
    /// Roughness of the prefilter mip, 0 for irradiance
    pub roughness: f32,
    /// Face size of the source cube
    pub source_size: f32,
    /// Padding
    pub _padding: f32,
}

/// Push constants of the postprocess and tonemap shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PostPush {
    /// Effect parameter, exposure, 1/width, 1/height
    pub params: [f32; 4],
    /// Effect color (outline)
    pub color: [f32; 4],
}

impl PostPush {
    /// Parameters for a target of the given size
    pub fn new(amount: f32, exposure: f32, width: u32, height: u32) -> Self {
        Self {
            params: [amount, exposure, 1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32],
            color: [0.0; 4],
        }
    }

    /// Set the effect color
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = [color.x, color.y, color.z, 1.0];
        self
    }
}

unsafe impl bytemuck::Pod for CameraUniform {}
unsafe impl bytemuck::Zeroable for CameraUniform {}

unsafe impl bytemuck::Pod for PointLightData {}
unsafe impl bytemuck::Zeroable for PointLightData {}

unsafe impl bytemuck::Pod for DirectionalLightData {}
unsafe impl bytemuck::Zeroable for DirectionalLightData {}

unsafe impl bytemuck::Pod for LightUniform {}
unsafe impl bytemuck::Zeroable for LightUniform {}

unsafe impl bytemuck::Pod for ShadowUniform {}
unsafe impl bytemuck::Zeroable for ShadowUniform {}

unsafe impl bytemuck::Pod for ObjectPush {}
unsafe impl bytemuck::Zeroable for ObjectPush {}

unsafe impl bytemuck::Pod for ShadowPush {}
unsafe impl bytemuck::Zeroable for ShadowPush {}

unsafe impl bytemuck::Pod for LightPush {}
unsafe impl bytemuck::Zeroable for LightPush {}

unsafe impl bytemuck::Pod for MaterialUniform {}
unsafe impl bytemuck::Zeroable for MaterialUniform {}

unsafe impl bytemuck::Pod for BakePush {}
unsafe impl bytemuck::Zeroable for BakePush {}

unsafe impl bytemuck::Pod for PostPush {}
unsafe impl bytemuck::Zeroable for PostPush {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::mem::size_of;

    #[test]
    fn test_std140_sizes() {
        assert_eq!(size_of::<CameraUniform>(), 5 * 64 + 32);
        assert_eq!(size_of::<LightUniform>(), 16 + 64 * 32 + 4 * 32);
        assert_eq!(size_of::<ShadowUniform>(), 4 * 64 + 32);
        assert_eq!(size_of::<MaterialUniform>(), 48);
        assert_eq!(size_of::<BakePush>(), 16);
        assert!(size_of::<ObjectPush>() <= 128);
    }

    #[test]
    fn test_light_arrays_are_bounded() {
        let mut lights = LightUniform::default();
        let transform = Transform::identity();
        for _ in 0..GraphicsLimits::MAX_POINT_LIGHTS {
            assert!(lights.push_point(&transform, &Light::default(), &PointLight::default()).is_some());
        }
        assert!(lights.push_point(&transform, &Light::default(), &PointLight::default()).is_none());
        assert_eq!(lights.point_count(), GraphicsLimits::MAX_POINT_LIGHTS);

        lights.clear();
        assert_eq!(lights.point_count(), 0);
    }

    #[test]
    fn test_directional_light_uses_forward_axis() {
        let mut lights = LightUniform::default();
        let light = Light {
            intensity: 2.0,
            ..Light::default()
        };
        let data = lights.push_directional(&Transform::identity(), &light, true).unwrap();
        assert_relative_eq!(data.direction[2], -1.0);
        assert_relative_eq!(data.direction[3], 1.0);
        assert_relative_eq!(data.color[0], 2.0);
    }

    #[test]
    fn test_camera_previous_defaults_to_current() {
        let camera = Camera::default();
        let transform = Transform::from_position(Vec3::new(0.0, 1.0, 5.0));
        let uniform = CameraUniform::new(&transform, &camera, 800, 600, None);
        assert_eq!(uniform.previous_view_projection, uniform.view_projection);
        assert_relative_eq!(uniform.clip[2], 800.0);
        assert_relative_eq!(uniform.position[1], 1.0);
    }

    #[test]
    fn test_material_uniform_packs_scalars_and_flags() {
        let desc = MaterialDesc {
            roughness: 0.25,
            metallic: 1.0,
            translucent: true,
            ..MaterialDesc::default()
        };
        let uniform = MaterialUniform::from(&desc);
        assert_relative_eq!(uniform.params[0], 0.25);
        assert_relative_eq!(uniform.params[1], 1.0);
        assert_eq!(uniform.flags[0], desc.flags().bits());
    }

    #[test]
    fn test_shadow_cascade_count_tracks_rendered_cascades() {
        let mut shadow = ShadowUniform::default();
        shadow.reset(2048);
        assert_eq!(shadow.cascade_count(), 0);
        shadow.set_cascade(0, &Mat4::identity(), 5.0);
        shadow.set_cascade(1, &Mat4::identity(), 30.0);
        assert_eq!(shadow.cascade_count(), 2);
        assert_relative_eq!(shadow.splits[1], 30.0);
        shadow.reset(2048);
        assert_eq!(shadow.cascade_count(), 0);
    }
}
