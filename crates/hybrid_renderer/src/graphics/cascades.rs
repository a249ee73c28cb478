//! Cascaded shadow map fitting
//!
//! The camera frustum up to `max_distance` is cut into slices with the
//! practical split scheme (a `lambda` blend of logarithmic and uniform
//! splits). Each slice is wrapped in a sphere and covered by an orthographic
//! light projection whose center is snapped to shadow map texels so the
//! cascades do not shimmer while the camera moves.

use super::components::{Camera, Transform};
use super::limits::GraphicsLimits;
use crate::core::config::ShadowConfig;
use crate::foundation::math::{orthographic, Mat4, Point3, Vec3};

/// How far behind a slice, in slice radii, casters are still captured
const CASTER_PULLBACK: f32 = 4.0;

/// Far distance of each cascade slice
pub fn split_distances(near: f32, far: f32, count: u32, lambda: f32) -> Vec<f32> {
    let count = count.clamp(1, GraphicsLimits::MAX_SHADOW_CASCADES);
    let near = near.max(f32::EPSILON);
    let far = far.max(near);
    (1..=count)
        .map(|i| {
            let p = i as f32 / count as f32;
            let log = near * (far / near).powf(p);
            let uniform = near + (far - near) * p;
            lambda * log + (1.0 - lambda) * uniform
        })
        .collect()
}

/// Cascade slices of one view
#[derive(Debug, Clone)]
pub struct CascadeFit {
    camera: Transform,
    fov_y: f32,
    aspect: f32,
    near: f32,
    splits: Vec<f32>,
    map_size: u32,
}

impl CascadeFit {
    /// Slices for a camera looking at a target of the given aspect ratio
    pub fn new(camera_transform: &Transform, camera: &Camera, aspect: f32, config: &ShadowConfig) -> Self {
        let far = camera.far.min(config.max_distance);
        Self {
            camera: camera_transform.clone(),
            fov_y: camera.fov_y,
            aspect,
            near: camera.near,
            splits: split_distances(camera.near, far, config.cascade_count, config.split_lambda),
            map_size: config.map_size.max(1),
        }
    }

    /// Far distance of every slice
    pub fn splits(&self) -> &[f32] {
        &self.splits
    }

    /// Near and far distance of `cascade`; cascades past the configured count reuse the last slice
    pub fn slice(&self, cascade: u32) -> (f32, f32) {
        let last = self.splits.len() - 1;
        let index = (cascade as usize).min(last);
        let near = if index == 0 { self.near } else { self.splits[index - 1] };
        (near, self.splits[index])
    }

    /// World-space corners of the frustum between two view distances
    pub fn slice_corners(&self, near: f32, far: f32) -> [Vec3; 8] {
        let tan = (self.fov_y * 0.5).tan();
        let mut corners = [Vec3::zeros(); 8];
        for (i, distance) in [near, far].into_iter().enumerate() {
            let h = distance * tan;
            let w = h * self.aspect;
            for (j, (x, y)) in [(-w, -h), (w, -h), (w, h), (-w, h)].into_iter().enumerate() {
                let local = Vec3::new(x, y, -distance);
                corners[i * 4 + j] = self.camera.position + self.camera.rotation * local;
            }
        }
        corners
    }

    /// World to light clip matrix covering `cascade` for light travelling along `direction`
    pub fn light_view_projection(&self, cascade: u32, direction: &Vec3) -> Mat4 {
        let direction = direction.try_normalize(f32::EPSILON).unwrap_or_else(|| -Vec3::y());
        let (near, far) = self.slice(cascade);
        let corners = self.slice_corners(near, far);

        let center = corners.iter().sum::<Vec3>() / corners.len() as f32;
        let radius = corners
            .iter()
            .map(|c| (c - center).norm())
            .fold(0.0_f32, f32::max)
            .max(f32::EPSILON);
        // quantized so the projection only changes when the slice grows a lot
        let radius = (radius * 16.0).ceil() / 16.0;

        let up = if direction.y.abs() > 0.99 { Vec3::z() } else { Vec3::y() };
        let rotation = Mat4::look_at_rh(&Point3::origin(), &Point3::from(direction), &up);

        // snap the center to whole texels in light space
        let texel = 2.0 * radius / self.map_size as f32;
        let mut light_center = rotation.transform_vector(&center);
        light_center.x = (light_center.x / texel).round() * texel;
        light_center.y = (light_center.y / texel).round() * texel;
        let snapped = rotation
            .try_inverse()
            .map_or(center, |inverse| inverse.transform_vector(&light_center));

        let eye = snapped - direction * radius * CASTER_PULLBACK;
        let view = Mat4::look_at_rh(&Point3::from(eye), &Point3::from(snapped), &up);
        let extent = radius + texel;
        let projection = orthographic(-extent, extent, -extent, extent, 0.0, radius * (CASTER_PULLBACK + 1.0));
        projection * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_splits_increase_and_end_at_far() {
        let splits = split_distances(0.1, 100.0, 4, 0.75);
        assert_eq!(splits.len(), 4);
        assert!(splits.windows(2).all(|w| w[0] < w[1]));
        assert_relative_eq!(splits[3], 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_lambda_zero_is_uniform() {
        let splits = split_distances(0.0, 100.0, 4, 0.0);
        assert_relative_eq!(splits[0], 25.0, epsilon = 1e-3);
        assert_relative_eq!(splits[1], 50.0, epsilon = 1e-3);
    }

    #[test]
    fn test_slice_is_inside_its_cascade() {
        let camera = Camera::default();
        let transform = Transform::looking_at(Vec3::new(0.0, 2.0, 10.0), Vec3::zeros(), Vec3::y());
        let fit = CascadeFit::new(&transform, &camera, 16.0 / 9.0, &ShadowConfig::default());
        let direction = Vec3::new(-0.3, -1.0, -0.2);

        for cascade in 0..4 {
            let matrix = fit.light_view_projection(cascade, &direction);
            let (near, far) = fit.slice(cascade);
            for corner in fit.slice_corners(near, far) {
                let clip = matrix * corner.push(1.0);
                let ndc = clip.xyz() / clip.w;
                assert!(ndc.x.abs() <= 1.0 + 1e-3, "cascade {cascade} x {}", ndc.x);
                assert!(ndc.y.abs() <= 1.0 + 1e-3, "cascade {cascade} y {}", ndc.y);
                assert!((-1e-3..=1.0 + 1e-3).contains(&ndc.z), "cascade {cascade} z {}", ndc.z);
            }
        }
    }

    #[test]
    fn test_slices_tile_the_range() {
        let camera = Camera::default();
        let fit = CascadeFit::new(&Transform::identity(), &camera, 1.0, &ShadowConfig::default());
        assert_relative_eq!(fit.slice(0).0, camera.near);
        for cascade in 1..4 {
            assert_relative_eq!(fit.slice(cascade).0, fit.slice(cascade - 1).1);
        }
    }
}
