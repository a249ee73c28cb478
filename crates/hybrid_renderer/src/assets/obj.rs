//! OBJ file loader for 3D models

use std::collections::HashMap;
use std::path::Path;

use super::mesh::Vertex;
use super::FormatError;

/// Triangle list read from an OBJ file
#[derive(Debug, Clone, Default)]
pub struct ObjMesh {
    /// Deduplicated vertices
    pub vertices: Vec<Vertex>,
    /// Triangle indices
    pub indices: Vec<u32>,
}

/// Loader for the position, texcoord, normal and face subset of OBJ
pub struct ObjLoader;

type Corner = (usize, Option<usize>, Option<usize>);

impl ObjLoader {
    /// Load an OBJ file
    pub fn load_obj(path: impl AsRef<Path>) -> Result<ObjMesh, FormatError> {
        let path = path.as_ref();
        log::debug!("Loading OBJ from: {:?}", path);
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Parse OBJ text; polygons are fan triangulated
    pub fn parse(source: &str) -> Result<ObjMesh, FormatError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut texcoords: Vec<[f32; 2]> = Vec::new();
        let mut mesh = ObjMesh::default();
        let mut lookup: HashMap<Corner, u32> = HashMap::new();

        for (number, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else { continue };
            let rest: Vec<&str> = parts.collect();

            match keyword {
                "v" => positions.push(floats(&rest, number)?),
                "vn" => normals.push(floats(&rest, number)?),
                "vt" => texcoords.push(floats(&rest, number)?),
                "f" => {
                    if rest.len() < 3 {
                        return Err(parse_error(number, "face needs at least 3 corners"));
                    }
                    let mut face = Vec::with_capacity(rest.len());
                    for corner in &rest {
                        let key = corner_indices(corner, number)?;
                        let index = match lookup.get(&key) {
                            Some(&index) => index,
                            None => {
                                let position = positions
                                    .get(key.0)
                                    .ok_or_else(|| parse_error(number, "position index out of bounds"))?;
                                let texcoord = key.1.and_then(|i| texcoords.get(i)).copied().unwrap_or([0.0, 0.0]);
                                let normal = key.2.and_then(|i| normals.get(i)).copied().unwrap_or([0.0, 1.0, 0.0]);
                                let index = mesh.vertices.len() as u32;
                                mesh.vertices.push(Vertex::new(*position, texcoord, normal));
                                lookup.insert(key, index);
                                index
                            }
                        };
                        face.push(index);
                    }
                    for i in 1..face.len() - 1 {
                        mesh.indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                    }
                }
                _ => {}
            }
        }

        if mesh.vertices.is_empty() {
            return Err(FormatError::Parse("No faces found in OBJ file".to_string()));
        }
        Ok(mesh)
    }
}

fn parse_error(line: usize, message: &str) -> FormatError {
    FormatError::Parse(format!("line {}: {message}", line + 1))
}

fn floats<const N: usize>(parts: &[&str], line: usize) -> Result<[f32; N], FormatError> {
    if parts.len() < N {
        return Err(parse_error(line, "too few components"));
    }
    let mut out = [0.0; N];
    for (value, part) in out.iter_mut().zip(parts) {
        *value = part.parse().map_err(|_| parse_error(line, "invalid number"))?;
    }
    Ok(out)
}

fn corner_indices(corner: &str, line: usize) -> Result<Corner, FormatError> {
    let mut fields = corner.split('/');
    let position = fields
        .next()
        .and_then(|p| p.parse::<usize>().ok())
        .and_then(|p| p.checked_sub(1))
        .ok_or_else(|| parse_error(line, "invalid position index"))?;
    let optional = |field: Option<&str>| {
        field
            .filter(|f| !f.is_empty())
            .and_then(|f| f.parse::<usize>().ok())
            .and_then(|i| i.checked_sub(1))
    };
    let texcoord = optional(fields.next());
    let normal = optional(fields.next());
    Ok((position, texcoord, normal))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vn 0 0 1
f 1/1/1 2/1/1 3/1/1 4/1/1
";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let mesh = ObjLoader::parse(QUAD).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices[2].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_shared_corners_are_deduplicated() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf 1 2 3\nf 3 2 4\n";
        let mesh = ObjLoader::parse(source).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
    }

    #[test]
    fn test_errors() {
        assert!(ObjLoader::parse("v 0 0 0\nf 1 2 3\n").is_err());
        assert!(ObjLoader::parse("v 0 zero 0\n").is_err());
        assert!(ObjLoader::parse("# nothing\n").is_err());
    }
}
