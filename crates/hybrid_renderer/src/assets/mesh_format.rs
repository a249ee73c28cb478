//! Binary mesh format
//!
//! Little-endian, in order: magic `MESH`, vertices, indices (base then
//! every LOD), LOD ranges, clusters, cluster vertices, cluster triangles,
//! hull triangles, bounding sphere, bounding box. Every array is prefixed
//! with its `u32` length.

use std::path::Path;

use super::bounds::{BoundingBox, BoundingSphere};
use super::hull::HullTriangle;
use super::io::{Reader, Writer};
use super::mesh::{MeshCluster, MeshData, MeshLod, Vertex};
use super::FormatError;

/// File magic
pub const MESH_MAGIC: [u8; 4] = *b"MESH";

const VERTEX_BYTES: usize = 32;
const LOD_BYTES: usize = 8;
const CLUSTER_BYTES: usize = 32;
const HULL_TRIANGLE_BYTES: usize = 36;

/// Serialize a mesh
pub fn encode_mesh(mesh: &MeshData) -> Vec<u8> {
    let mut w = Writer::default();
    w.bytes(&MESH_MAGIC);

    w.count(mesh.vertices.len());
    for v in &mesh.vertices {
        w.f32s(&v.position);
        w.f32s(&v.texcoord);
        w.f32s(&v.normal);
    }

    w.count(mesh.indices.len());
    for index in &mesh.indices {
        w.u32(*index);
    }

    w.count(mesh.lods.len());
    for lod in &mesh.lods {
        w.u32(lod.offset);
        w.u32(lod.count);
    }

    w.count(mesh.clusters.len());
    for c in &mesh.clusters {
        w.u32(c.vertex_offset);
        w.u32(c.vertex_count);
        w.u32(c.triangle_offset);
        w.u32(c.triangle_count);
        w.f32s(&c.bounds.center);
        w.f32(c.bounds.radius);
    }

    w.count(mesh.cluster_vertices.len());
    for index in &mesh.cluster_vertices {
        w.u32(*index);
    }

    w.count(mesh.cluster_triangles.len());
    w.bytes(&mesh.cluster_triangles);

    w.count(mesh.hull.len());
    for triangle in &mesh.hull {
        for corner in &triangle.vertices {
            w.f32s(corner);
        }
    }

    w.f32s(&mesh.bounding_sphere.center);
    w.f32(mesh.bounding_sphere.radius);
    w.f32s(&mesh.bounding_box.min);
    w.f32s(&mesh.bounding_box.max);
    w.into_bytes()
}

/// Deserialize a mesh; structural checks are left to [`MeshData::validate`]
pub fn decode_mesh(bytes: &[u8]) -> Result<MeshData, FormatError> {
    let mut r = Reader::new(bytes);
    r.magic(MESH_MAGIC)?;

    let count = r.count("vertex", VERTEX_BYTES)?;
    let mut vertices = Vec::with_capacity(count);
    for _ in 0..count {
        vertices.push(Vertex {
            position: r.f32s("vertex position")?,
            texcoord: r.f32s("vertex texcoord")?,
            normal: r.f32s("vertex normal")?,
        });
    }

    let count = r.count("index", 4)?;
    let indices = (0..count).map(|_| r.u32("index")).collect::<Result<Vec<_>, _>>()?;

    let count = r.count("lod", LOD_BYTES)?;
    let mut lods = Vec::with_capacity(count);
    for _ in 0..count {
        lods.push(MeshLod {
            offset: r.u32("lod offset")?,
            count: r.u32("lod count")?,
        });
    }

    let count = r.count("cluster", CLUSTER_BYTES)?;
    let mut clusters = Vec::with_capacity(count);
    for _ in 0..count {
        clusters.push(MeshCluster {
            vertex_offset: r.u32("cluster")?,
            vertex_count: r.u32("cluster")?,
            triangle_offset: r.u32("cluster")?,
            triangle_count: r.u32("cluster")?,
            bounds: BoundingSphere {
                center: r.f32s("cluster bounds")?,
                radius: r.f32("cluster bounds")?,
            },
        });
    }

    let count = r.count("cluster vertex", 4)?;
    let cluster_vertices = (0..count)
        .map(|_| r.u32("cluster vertex"))
        .collect::<Result<Vec<_>, _>>()?;

    let count = r.count("cluster triangle byte", 1)?;
    let cluster_triangles = r.take(count, "cluster triangles")?.to_vec();

    let count = r.count("hull triangle", HULL_TRIANGLE_BYTES)?;
    let mut hull = Vec::with_capacity(count);
    for _ in 0..count {
        hull.push(HullTriangle {
            vertices: [r.f32s("hull")?, r.f32s("hull")?, r.f32s("hull")?],
        });
    }

    let bounding_sphere = BoundingSphere {
        center: r.f32s("bounding sphere")?,
        radius: r.f32("bounding sphere")?,
    };
    let bounding_box = BoundingBox {
        min: r.f32s("bounding box")?,
        max: r.f32s("bounding box")?,
    };
    r.finish()?;

    Ok(MeshData {
        vertices,
        indices,
        lods,
        clusters,
        cluster_vertices,
        cluster_triangles,
        hull,
        bounding_sphere,
        bounding_box,
    })
}

/// Read and decode a mesh file
pub fn load_mesh(path: impl AsRef<Path>) -> Result<MeshData, FormatError> {
    let path = path.as_ref();
    log::debug!("Loading mesh from: {:?}", path);
    decode_mesh(&std::fs::read(path)?)
}

/// Encode and write a mesh file
pub fn save_mesh(mesh: &MeshData, path: impl AsRef<Path>) -> Result<(), FormatError> {
    std::fs::write(path, encode_mesh(mesh))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::mesh::MeshBuildOptions;

    fn tetrahedron() -> MeshData {
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0], [0.0, 0.0, 1.0]),
            Vertex::new([1.0, 0.0, 0.0], [1.0, 0.0], [0.0, 0.0, 1.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 1.0], [0.0, 0.0, 1.0]),
            Vertex::new([0.0, 0.0, 1.0], [1.0, 1.0], [1.0, 0.0, 0.0]),
        ];
        let indices = vec![0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3];
        MeshData::build(vertices, indices, &MeshBuildOptions::default()).unwrap()
    }

    #[test]
    fn test_mesh_survives_encoding() {
        let mesh = tetrahedron();
        assert_eq!(mesh.hull.len(), 4);
        let bytes = encode_mesh(&mesh);
        assert_eq!(&bytes[..4], b"MESH");
        assert_eq!(decode_mesh(&bytes).unwrap(), mesh);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode_mesh(&tetrahedron());
        bytes[0] = b'X';
        assert!(matches!(decode_mesh(&bytes), Err(FormatError::BadMagic { .. })));
    }

    #[test]
    fn test_truncated_and_oversized_counts() {
        let bytes = encode_mesh(&tetrahedron());
        assert!(matches!(
            decode_mesh(&bytes[..bytes.len() - 2]),
            Err(FormatError::Truncated(_))
        ));

        let mut huge = b"MESH".to_vec();
        huge.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode_mesh(&huge),
            Err(FormatError::InvalidCount { field: "vertex", .. })
        ));
    }
}
