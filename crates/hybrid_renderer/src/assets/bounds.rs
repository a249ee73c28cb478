//! Bounding volumes

use crate::foundation::math::Vec3;

/// Sphere enclosing a set of points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    /// Center
    pub center: [f32; 3],
    /// Radius
    pub radius: f32,
}

impl BoundingSphere {
    /// Ritter's approximate minimal sphere
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(&first) = points.first() else {
            return Self::default();
        };

        let farthest = |from: Vec3| {
            points
                .iter()
                .copied()
                .max_by(|a, b| (a - from).norm_squared().total_cmp(&(b - from).norm_squared()))
                .unwrap_or(from)
        };
        let a = farthest(first);
        let b = farthest(a);

        let mut center = (a + b) * 0.5;
        let mut radius = (b - a).norm() * 0.5;
        for p in points {
            let distance = (p - center).norm();
            if distance > radius {
                let grown = (radius + distance) * 0.5;
                center += (p - center) * ((grown - radius) / distance);
                radius = grown;
            }
        }

        Self {
            center: center.into(),
            radius,
        }
    }

    /// Center as a vector
    pub fn center(&self) -> Vec3 {
        Vec3::from(self.center)
    }

    /// Whether `point` is inside, with a relative tolerance
    pub fn contains(&self, point: &Vec3) -> bool {
        (point - self.center()).norm() <= self.radius * (1.0 + 1e-4) + 1e-6
    }
}

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: [f32; 3],
    /// Maximum corner
    pub max: [f32; 3],
}

impl BoundingBox {
    /// Smallest box containing every point
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(&first) = points.first() else {
            return Self::default();
        };
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.inf(p), max.sup(p)));
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    /// Edge lengths
    pub fn extent(&self) -> Vec3 {
        Vec3::from(self.max) - Vec3::from(self.min)
    }

    /// Center point
    pub fn center(&self) -> Vec3 {
        (Vec3::from(self.max) + Vec3::from(self.min)) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube() -> Vec<Vec3> {
        let mut points = Vec::new();
        for x in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                for z in [-1.0, 1.0] {
                    points.push(Vec3::new(x, y, z));
                }
            }
        }
        points
    }

    #[test]
    fn test_sphere_contains_every_point() {
        let mut points = cube();
        points.push(Vec3::new(3.0, 0.5, -0.2));
        let sphere = BoundingSphere::from_points(&points);
        assert!(points.iter().all(|p| sphere.contains(p)));
    }

    #[test]
    fn test_cube_sphere_is_tight() {
        let sphere = BoundingSphere::from_points(&cube());
        assert_relative_eq!(sphere.radius, 3.0_f32.sqrt(), epsilon = 1e-4);
        assert_relative_eq!(sphere.center().norm(), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_box_bounds() {
        let bounds = BoundingBox::from_points(&[Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 4.0, 2.0)]);
        assert_eq!(bounds.min, [-1.0, -2.0, 0.0]);
        assert_eq!(bounds.max, [1.0, 4.0, 2.0]);
        assert_relative_eq!(bounds.extent().y, 6.0);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(BoundingSphere::from_points(&[]), BoundingSphere::default());
        assert_eq!(BoundingBox::from_points(&[]), BoundingBox::default());
    }
}
