//! Incremental 3D convex hull

use std::collections::HashSet;

use crate::foundation::math::Vec3;

/// Outward-facing hull triangle, counter-clockwise seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HullTriangle {
    /// Corner positions
    pub vertices: [[f32; 3]; 3],
}

impl HullTriangle {
    /// Unnormalized outward normal
    pub fn normal(&self) -> Vec3 {
        let [a, b, c] = self.vertices.map(Vec3::from);
        (b - a).cross(&(c - a))
    }
}

#[derive(Clone, Copy)]
struct Face {
    v: [usize; 3],
    normal: Vec3,
    offset: f32,
}

impl Face {
    fn new(points: &[Vec3], v: [usize; 3]) -> Self {
        let normal = (points[v[1]] - points[v[0]])
            .cross(&(points[v[2]] - points[v[0]]))
            .try_normalize(0.0)
            .unwrap_or_else(Vec3::zeros);
        Self {
            v,
            normal,
            offset: normal.dot(&points[v[0]]),
        }
    }

    fn distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) - self.offset
    }

    fn edges(&self) -> [(usize, usize); 3] {
        [(self.v[0], self.v[1]), (self.v[1], self.v[2]), (self.v[2], self.v[0])]
    }
}

fn farthest_by(points: &[Vec3], score: impl Fn(&Vec3) -> f32) -> (usize, f32) {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, score(p)))
        .fold((0, f32::MIN), |best, item| if item.1 > best.1 { item } else { best })
}

/// Hull of `points`; empty when they do not span a volume
pub fn convex_hull(points: &[Vec3]) -> Vec<HullTriangle> {
    if points.len() < 4 {
        return Vec::new();
    }

    let (a, _) = farthest_by(points, |p| -p.x);
    let (b, span) = farthest_by(points, |p| (p - points[a]).norm());
    let eps = span.max(f32::EPSILON) * 1e-5;
    if span <= eps {
        return Vec::new();
    }
    let axis = (points[b] - points[a]) / span;
    let (c, line_distance) = farthest_by(points, |p| (p - points[a]).cross(&axis).norm());
    if line_distance <= eps {
        return Vec::new();
    }
    let base = Face::new(points, [a, b, c]);
    let (d, _) = farthest_by(points, |p| base.distance(p).abs());
    if base.distance(&points[d]).abs() <= eps {
        return Vec::new();
    }

    // seed tetrahedron with every face pointing away from the opposite vertex
    let mut faces: Vec<Face> = [[a, b, c], [a, c, d], [a, d, b], [b, d, c]]
        .into_iter()
        .map(|v| {
            let face = Face::new(points, v);
            let opposite = [a, b, c, d].into_iter().find(|i| !v.contains(i)).unwrap_or(a);
            if face.distance(&points[opposite]) > 0.0 {
                Face::new(points, [v[0], v[2], v[1]])
            } else {
                face
            }
        })
        .collect();

    for (index, point) in points.iter().enumerate() {
        if [a, b, c, d].contains(&index) {
            continue;
        }
        let visible: Vec<bool> = faces.iter().map(|f| f.distance(point) > eps).collect();
        if !visible.contains(&true) {
            continue;
        }

        let visible_edges: HashSet<(usize, usize)> = faces
            .iter()
            .zip(&visible)
            .filter(|(_, v)| **v)
            .flat_map(|(f, _)| f.edges())
            .collect();
        let horizon: Vec<(usize, usize)> = visible_edges
            .iter()
            .copied()
            .filter(|(from, to)| !visible_edges.contains(&(*to, *from)))
            .collect();

        let mut kept: Vec<Face> = faces
            .iter()
            .zip(&visible)
            .filter(|(_, v)| !**v)
            .map(|(f, _)| *f)
            .collect();
        kept.extend(horizon.into_iter().map(|(from, to)| Face::new(points, [from, to, index])));
        faces = kept;
    }

    faces
        .iter()
        .map(|f| HullTriangle {
            vertices: f.v.map(|i| points[i].into()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_cube_hull_faces_outward() {
        let mut points = cube();
        // interior points never reach the hull
        points.push(Vec3::new(0.2, 0.1, -0.3));
        points.push(Vec3::zeros());
        let hull = convex_hull(&points);
        assert_eq!(hull.len(), 12);
        for triangle in &hull {
            let centroid = triangle.vertices.iter().map(|v| Vec3::from(*v)).sum::<Vec3>() / 3.0;
            assert!(triangle.normal().dot(&centroid) > 0.0);
        }
    }

    #[test]
    fn test_hull_encloses_points() {
        let points: Vec<Vec3> = (0..200)
            .map(|i| {
                let t = i as f32 * 0.37;
                Vec3::new(t.sin() * 2.0, (t * 1.3).cos(), (t * 0.7).sin() * 3.0)
            })
            .collect();
        let hull = convex_hull(&points);
        assert!(hull.len() >= 4);
        for triangle in &hull {
            let n = triangle.normal().normalize();
            let origin = Vec3::from(triangle.vertices[0]);
            for p in &points {
                assert!(n.dot(&(p - origin)) <= 1e-3);
            }
        }
    }

    #[test]
    fn test_coplanar_input_has_no_hull() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ];
        assert!(convex_hull(&points).is_empty());
        assert!(convex_hull(&points[..3]).is_empty());
    }
}
