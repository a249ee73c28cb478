//! Math utilities and types
//!
//! nalgebra aliases plus the projection helpers the renderer needs. Projections
//! target Vulkan clip space: depth in `[0, 1]` and Y pointing down.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Transform placed at `eye` whose forward axis (-Z) points at `target`
    pub fn looking_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let forward = target - eye;
        let rotation = if forward.norm_squared() > f32::EPSILON {
            // face_towards aligns +Z with the direction, we look down -Z
            Quat::face_towards(&-forward, &up)
        } else {
            Quat::identity()
        };
        Self::from_position_rotation(eye, rotation)
    }

    /// World matrix (translation * rotation * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// View matrix for a camera placed at this transform, scale ignored
    pub fn view_matrix(&self) -> Mat4 {
        let rotation_inverse = self.rotation.inverse().to_homogeneous();
        rotation_inverse * Mat4::new_translation(&-self.position)
    }

    /// Direction of the local -Z axis in world space
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::new(0.0, 0.0, -1.0)
    }
}

/// Perspective projection into Vulkan clip space
pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fov_y * 0.5).tan();
    let range = far - near;
    #[rustfmt::skip]
    let m = Mat4::new(
        f / aspect, 0.0, 0.0,                  0.0,
        0.0,        -f,  0.0,                  0.0,
        0.0,        0.0, -far / range,         -(far * near) / range,
        0.0,        0.0, -1.0,                 0.0,
    );
    m
}

/// Orthographic projection into Vulkan clip space
pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = far - near;
    #[rustfmt::skip]
    let m = Mat4::new(
        2.0 / width, 0.0,           0.0,          -(right + left) / width,
        0.0,         -2.0 / height, 0.0,          (top + bottom) / height,
        0.0,         0.0,           -1.0 / depth, -near / depth,
        0.0,         0.0,           0.0,          1.0,
    );
    m
}

/// Right-handed look-at view matrix
pub fn look_at(eye: &Point3, target: &Point3, up: &Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, target, up)
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_matrix_applies_scale_then_translation() {
        let transform = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::identity(),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let p = transform.to_matrix() * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p, Vec4::new(3.0, 2.0, 3.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_view_matrix_inverts_world_matrix() {
        let transform = Transform::looking_at(
            Vec3::new(3.0, 4.0, 5.0),
            Vec3::zeros(),
            Vec3::y(),
        );
        let product = transform.view_matrix() * transform.to_matrix();
        assert_relative_eq!(product, Mat4::identity(), epsilon = 1e-5);
    }

    #[test]
    fn test_looking_at_forward_points_at_target() {
        let transform = Transform::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), Vec3::y());
        assert_relative_eq!(transform.forward(), Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_perspective_maps_near_and_far_to_unit_depth() {
        let proj = perspective(constants::HALF_PI, 1.0, 0.1, 100.0);
        let near = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_orthographic_maps_box_to_clip_volume() {
        let proj = orthographic(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);
        let corner = proj * Vec4::new(2.0, 1.0, -10.0, 1.0);
        assert_relative_eq!(corner, Vec4::new(1.0, -1.0, 1.0, 1.0), epsilon = 1e-6);
    }
}
