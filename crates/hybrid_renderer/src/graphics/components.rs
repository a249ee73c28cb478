//! Component structs the renderer reads per draw
//!
//! These are plain data. Whatever scene representation the caller uses
//! hands them over together with a world [`Transform`].

use super::handles::{EnvironmentHandle, MaterialHandle, MeshHandle};
use crate::foundation::math::{constants::DEG_TO_RAD, Vec3};

pub use crate::foundation::math::Transform;

/// Perspective camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    /// Environment used for the skybox and image based lighting
    pub environment: Option<EnvironmentHandle>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_y: 60.0 * DEG_TO_RAD,
            near: 0.1,
            far: 1000.0,
            environment: None,
        }
    }
}

impl Camera {
    /// Camera with the given field of view in degrees
    pub fn with_fov_degrees(mut self, degrees: f32) -> Self {
        self.fov_y = degrees * DEG_TO_RAD;
        self
    }

    /// Attach an environment
    pub fn with_environment(mut self, environment: EnvironmentHandle) -> Self {
        self.environment = Some(environment);
        self
    }
}

/// Properties shared by every light type
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Linear color
    pub color: Vec3,
    /// Scale applied to `color`
    pub intensity: f32,
    /// Whether the light renders shadow cascades
    pub shadow_enabled: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            shadow_enabled: false,
        }
    }
}

impl Light {
    /// Color premultiplied by intensity
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }
}

/// Light shining along the transform's forward axis from infinitely far away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionalLight;

/// Light emitted from the transform's position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// Distance at which the contribution reaches zero
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self { radius: 10.0 }
    }
}

/// Mesh drawn with a material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Vertex and index data
    pub mesh: MeshHandle,
    /// Surface description
    pub material: MaterialHandle,
}
