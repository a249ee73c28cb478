//! Mesh data with LODs, clusters, hull and bounds

use super::bounds::{BoundingBox, BoundingSphere};
use super::cluster::build_clusters;
use super::hull::{convex_hull, HullTriangle};
use super::simplify::simplify_clustered;
use crate::foundation::math::Vec3;
use crate::graphics::error::{RenderError, RenderResult};

pub use super::cluster::MeshCluster;

/// Interleaved vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Position in object space
    pub position: [f32; 3],
    /// Texture coordinates
    pub texcoord: [f32; 2],
    /// Normal vector
    pub normal: [f32; 3],
}

// Only f32 arrays, no padding
unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Vertex from its attributes
    pub const fn new(position: [f32; 3], texcoord: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            texcoord,
            normal,
        }
    }
}

/// Range of the shared index buffer drawn for one level of detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshLod {
    /// First index
    pub offset: u32,
    /// Number of indices
    pub count: u32,
}

/// Knobs of [`MeshData::build`]
#[derive(Debug, Clone)]
pub struct MeshBuildOptions {
    /// Levels including the base mesh
    pub max_lods: usize,
    /// Fraction of indices a level must drop relative to the previous one
    pub min_reduction: f32,
    /// Grid cells across the largest extent of the mesh for the first simplified level
    pub base_grid_resolution: f32,
    /// Unique vertices per cluster
    pub max_cluster_vertices: usize,
    /// Triangles per cluster
    pub max_cluster_triangles: usize,
    /// Compute the convex hull
    pub build_hull: bool,
}

impl Default for MeshBuildOptions {
    fn default() -> Self {
        Self {
            max_lods: 5,
            min_reduction: 0.1,
            base_grid_resolution: 64.0,
            max_cluster_vertices: 64,
            max_cluster_triangles: 124,
            build_hull: true,
        }
    }
}

/// Retries with a doubled cell when a level does not shrink enough
const MAX_CELL_DOUBLINGS: u32 = 8;

/// Mesh with every preprocessed product the renderer and callers use
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Shared vertex buffer
    pub vertices: Vec<Vertex>,
    /// Base indices followed by every simplified level
    pub indices: Vec<u32>,
    /// Index ranges, LOD 0 first
    pub lods: Vec<MeshLod>,
    /// Meshlets of LOD 0
    pub clusters: Vec<MeshCluster>,
    /// Global vertex indices referenced by the clusters
    pub cluster_vertices: Vec<u32>,
    /// Local triangle indices of the clusters
    pub cluster_triangles: Vec<u8>,
    /// Convex hull, empty for flat meshes
    pub hull: Vec<HullTriangle>,
    /// Enclosing sphere
    pub bounding_sphere: BoundingSphere,
    /// Enclosing box
    pub bounding_box: BoundingBox,
}

impl MeshData {
    /// Single-LOD mesh without preprocessing beyond bounds
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let positions = positions(&vertices);
        let count = indices.len() as u32;
        Self {
            bounding_sphere: BoundingSphere::from_points(&positions),
            bounding_box: BoundingBox::from_points(&positions),
            vertices,
            indices,
            lods: vec![MeshLod { offset: 0, count }],
            ..Self::default()
        }
    }

    /// Build LODs, clusters, hull and bounds for a triangle list
    pub fn build(vertices: Vec<Vertex>, indices: Vec<u32>, options: &MeshBuildOptions) -> RenderResult<Self> {
        let mut mesh = Self::new(vertices, indices);
        mesh.validate()?;

        let positions = positions(&mesh.vertices);
        mesh.generate_lods(&positions, options);

        let base = &mesh.indices[..mesh.lods[0].count as usize];
        let clusters = build_clusters(
            &positions,
            base,
            options.max_cluster_vertices,
            options.max_cluster_triangles,
        );
        mesh.clusters = clusters.clusters;
        mesh.cluster_vertices = clusters.vertices;
        mesh.cluster_triangles = clusters.triangles;

        if options.build_hull {
            mesh.hull = convex_hull(&positions);
        }

        log::debug!(
            "Built mesh: {} vertices, {} LODs, {} clusters, {} hull triangles",
            mesh.vertices.len(),
            mesh.lods.len(),
            mesh.clusters.len(),
            mesh.hull.len()
        );
        Ok(mesh)
    }

    fn generate_lods(&mut self, positions: &[Vec3], options: &MeshBuildOptions) {
        let extent = self.bounding_box.extent().max();
        if extent <= 0.0 {
            return;
        }
        let origin = Vec3::from(self.bounding_box.min);
        let mut cell = extent / options.base_grid_resolution.max(1.0);
        let mut previous = self.indices.clone();

        'levels: while self.lods.len() < options.max_lods {
            for _ in 0..MAX_CELL_DOUBLINGS {
                let simplified = simplify_clustered(positions, &previous, &origin, cell);
                cell *= 2.0;
                if simplified.len() < 3 {
                    break 'levels;
                }
                let budget = previous.len() as f32 * (1.0 - options.min_reduction);
                if simplified.len() as f32 <= budget {
                    self.lods.push(MeshLod {
                        offset: self.indices.len() as u32,
                        count: simplified.len() as u32,
                    });
                    self.indices.extend_from_slice(&simplified);
                    previous = simplified;
                    continue 'levels;
                }
            }
            break;
        }
    }

    /// Check every structural invariant
    pub fn validate(&self) -> RenderResult<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(RenderError::InvalidMesh("mesh has no vertices or indices".to_string()));
        }
        let vertex_count = self.vertices.len();
        if let Some(index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(RenderError::InvalidMesh(format!(
                "index {index} out of range for {vertex_count} vertices"
            )));
        }
        let Some(first) = self.lods.first() else {
            return Err(RenderError::InvalidMesh("mesh has no LODs".to_string()));
        };
        if first.offset != 0 || first.count == 0 {
            return Err(RenderError::InvalidMesh(format!("LOD 0 {first:?} must start at 0")));
        }

        let mut expected_offset = 0u64;
        for (level, lod) in self.lods.iter().enumerate() {
            if lod.count == 0 || lod.count % 3 != 0 {
                return Err(RenderError::InvalidMesh(format!(
                    "LOD {level} count {} is not a positive multiple of 3",
                    lod.count
                )));
            }
            if u64::from(lod.offset) != expected_offset {
                return Err(RenderError::InvalidMesh(format!(
                    "LOD {level} offset {} should be {expected_offset}",
                    lod.offset
                )));
            }
            expected_offset += u64::from(lod.count);
        }
        if expected_offset != self.indices.len() as u64 {
            return Err(RenderError::InvalidMesh(format!(
                "LODs cover {expected_offset} of {} indices",
                self.indices.len()
            )));
        }
        Ok(())
    }

    /// Vertex positions
    pub fn positions(&self) -> Vec<Vec3> {
        positions(&self.vertices)
    }
}

fn positions(vertices: &[Vertex]) -> Vec<Vec3> {
    vertices.iter().map(|v| Vec3::from(v.position)).collect()
}

/// LOD for an object of bounding `radius` seen from `distance`
///
/// Each level covers twice the distance of the previous one, starting at
/// eight radii.
pub fn select_lod(distance: f32, radius: f32, lod_count: u32) -> u32 {
    if lod_count <= 1 {
        return 0;
    }
    let reference = (radius * 8.0).max(f32::EPSILON);
    let ratio = distance / reference;
    if ratio <= 1.0 {
        return 0;
    }
    let level = ratio.log2().floor() as u32 + 1;
    level.min(lod_count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sphere(rings: u32, segments: u32) -> (Vec<Vertex>, Vec<u32>) {
        let mut vertices = Vec::new();
        for ring in 0..=rings {
            let theta = ring as f32 / rings as f32 * PI;
            for segment in 0..=segments {
                let phi = segment as f32 / segments as f32 * 2.0 * PI;
                let n = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
                vertices.push(Vertex::new(n, [segment as f32 / segments as f32, ring as f32 / rings as f32], n));
            }
        }
        let mut indices = Vec::new();
        let row = segments + 1;
        for ring in 0..rings {
            for segment in 0..segments {
                let i = ring * row + segment;
                indices.extend_from_slice(&[i, i + row, i + 1, i + 1, i + row, i + row + 1]);
            }
        }
        (vertices, indices)
    }

    #[test]
    fn test_lod_ranges_tile_the_index_buffer() {
        let (vertices, indices) = sphere(48, 96);
        let base = indices.len() as u32;
        let mesh = MeshData::build(vertices, indices, &MeshBuildOptions::default()).unwrap();

        assert!(mesh.lods.len() > 1, "dense sphere should simplify");
        assert_eq!(mesh.lods[0], MeshLod { offset: 0, count: base });
        let mut running = 0;
        for lod in &mesh.lods {
            assert_eq!(lod.offset, running);
            running += lod.count;
        }
        assert_eq!(running as usize, mesh.indices.len());
        for pair in mesh.lods.windows(2) {
            assert!(pair[1].count < pair[0].count);
        }
        mesh.validate().unwrap();
    }

    #[test]
    fn test_build_products() {
        let (vertices, indices) = sphere(16, 32);
        let mesh = MeshData::build(vertices, indices, &MeshBuildOptions::default()).unwrap();
        let clustered: u32 = mesh.clusters.iter().map(|c| c.triangle_count).sum();
        assert_eq!(clustered, mesh.lods[0].count / 3);
        assert!(!mesh.hull.is_empty());
        assert!((mesh.bounding_sphere.radius - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_max_lods_is_respected() {
        let (vertices, indices) = sphere(48, 96);
        let options = MeshBuildOptions {
            max_lods: 2,
            ..MeshBuildOptions::default()
        };
        let mesh = MeshData::build(vertices, indices, &options).unwrap();
        assert!(mesh.lods.len() <= 2);
    }

    #[test]
    fn test_validate_rejects_broken_meshes() {
        let vertices = vec![Vertex::default(); 3];
        assert!(MeshData::new(vertices.clone(), vec![0, 1, 3]).validate().is_err());
        assert!(MeshData::new(vertices.clone(), vec![0, 1]).validate().is_err());
        assert!(MeshData::new(Vec::new(), Vec::new()).validate().is_err());

        let mut mesh = MeshData::new(vertices, vec![0, 1, 2, 2, 1, 0]);
        mesh.lods = vec![MeshLod { offset: 0, count: 3 }, MeshLod { offset: 4, count: 3 }];
        assert!(mesh.validate().is_err(), "gap between LODs");
        mesh.lods = vec![MeshLod { offset: 0, count: 3 }, MeshLod { offset: 3, count: 3 }];
        mesh.validate().unwrap();
    }

    #[test]
    fn test_select_lod_by_distance() {
        assert_eq!(select_lod(5.0, 1.0, 4), 0);
        assert_eq!(select_lod(12.0, 1.0, 4), 1);
        assert_eq!(select_lod(20.0, 1.0, 4), 2);
        assert_eq!(select_lod(1000.0, 1.0, 4), 3);
        assert_eq!(select_lod(1000.0, 1.0, 1), 0);
    }
}
