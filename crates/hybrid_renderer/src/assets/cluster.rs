//! Greedy meshlet partitioning

use std::collections::HashMap;

use super::bounds::BoundingSphere;
use crate::foundation::math::Vec3;

/// One meshlet: a run of local vertices and local triangles
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshCluster {
    /// First entry in `cluster_vertices`
    pub vertex_offset: u32,
    /// Unique vertices referenced
    pub vertex_count: u32,
    /// First byte in `cluster_triangles`
    pub triangle_offset: u32,
    /// Triangles, three local index bytes each
    pub triangle_count: u32,
    /// Bounds of the referenced vertices
    pub bounds: BoundingSphere,
}

/// Output of [`build_clusters`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clusters {
    /// Meshlets in triangle order
    pub clusters: Vec<MeshCluster>,
    /// Global vertex indices, `vertex_count` per cluster
    pub vertices: Vec<u32>,
    /// Local vertex indices, three per triangle
    pub triangles: Vec<u8>,
}

struct Open {
    local: HashMap<u32, u8>,
    vertices: Vec<u32>,
    triangles: Vec<u8>,
}

impl Open {
    fn new() -> Self {
        Self {
            local: HashMap::new(),
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    fn new_vertices(&self, triangle: &[u32]) -> usize {
        let mut fresh = 0;
        for (i, index) in triangle.iter().enumerate() {
            if !self.local.contains_key(index) && !triangle[..i].contains(index) {
                fresh += 1;
            }
        }
        fresh
    }
}

/// Split triangles into clusters of at most `max_vertices` unique vertices
/// and `max_triangles` triangles, keeping input order
///
/// `max_vertices` is clamped to 256 so local indices fit a byte.
pub fn build_clusters(positions: &[Vec3], indices: &[u32], max_vertices: usize, max_triangles: usize) -> Clusters {
    let max_vertices = max_vertices.clamp(3, 256);
    let max_triangles = max_triangles.max(1);
    let mut out = Clusters::default();
    let mut open = Open::new();

    for triangle in indices.chunks_exact(3) {
        let full = open.triangles.len() / 3 >= max_triangles
            || open.vertices.len() + open.new_vertices(triangle) > max_vertices;
        if full {
            flush(&mut out, &mut open, positions);
        }
        for &index in triangle {
            let next = open.vertices.len() as u8;
            let local = *open.local.entry(index).or_insert_with(|| {
                open.vertices.push(index);
                next
            });
            open.triangles.push(local);
        }
    }
    flush(&mut out, &mut open, positions);
    out
}

fn flush(out: &mut Clusters, open: &mut Open, positions: &[Vec3]) {
    if open.triangles.is_empty() {
        return;
    }
    let points: Vec<Vec3> = open.vertices.iter().map(|&i| positions[i as usize]).collect();
    out.clusters.push(MeshCluster {
        vertex_offset: out.vertices.len() as u32,
        vertex_count: open.vertices.len() as u32,
        triangle_offset: out.triangles.len() as u32,
        triangle_count: (open.triangles.len() / 3) as u32,
        bounds: BoundingSphere::from_points(&points),
    });
    out.vertices.append(&mut open.vertices);
    out.triangles.append(&mut open.triangles);
    open.local.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(triangles: u32) -> (Vec<Vec3>, Vec<u32>) {
        let positions = (0..triangles + 2)
            .map(|i| Vec3::new(i as f32, (i % 2) as f32, 0.0))
            .collect();
        let indices = (0..triangles).flat_map(|i| [i, i + 1, i + 2]).collect();
        (positions, indices)
    }

    #[test]
    fn test_limits_are_respected() {
        let (positions, indices) = strip(500);
        let clusters = build_clusters(&positions, &indices, 64, 124);
        assert!(clusters.clusters.len() > 1);
        for cluster in &clusters.clusters {
            assert!(cluster.vertex_count <= 64);
            assert!(cluster.triangle_count <= 124);
        }
        let total: u32 = clusters.clusters.iter().map(|c| c.triangle_count).sum();
        assert_eq!(total, 500);
    }

    #[test]
    fn test_local_indices_resolve_to_original_triangles() {
        let (positions, indices) = strip(300);
        let clusters = build_clusters(&positions, &indices, 64, 124);
        let mut rebuilt = Vec::new();
        for cluster in &clusters.clusters {
            let vertices = &clusters.vertices[cluster.vertex_offset as usize..][..cluster.vertex_count as usize];
            let start = cluster.triangle_offset as usize;
            let end = start + cluster.triangle_count as usize * 3;
            rebuilt.extend(clusters.triangles[start..end].iter().map(|&l| vertices[l as usize]));
        }
        assert_eq!(rebuilt, indices);
    }

    #[test]
    fn test_triangle_limit_splits_first() {
        let (positions, indices) = strip(10);
        let clusters = build_clusters(&positions, &indices, 64, 4);
        let counts: Vec<u32> = clusters.clusters.iter().map(|c| c.triangle_count).collect();
        assert_eq!(counts, vec![4, 4, 2]);
    }
}
