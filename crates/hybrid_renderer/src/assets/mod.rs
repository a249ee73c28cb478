//! Asset data the renderer consumes
//!
//! Mesh preprocessing (LODs, clusters, hull, bounds), the binary mesh and
//! material formats, and decoding helpers for images and OBJ files.

pub mod bounds;
pub mod cluster;
pub mod hull;
pub mod material_format;
pub mod mesh;
pub mod mesh_format;
pub mod obj;
pub mod simplify;
pub mod texture_decode;

mod io;

pub use bounds::{BoundingBox, BoundingSphere};
pub use material_format::MaterialFile;
pub use mesh::{MeshBuildOptions, MeshCluster, MeshData, MeshLod, Vertex};
pub use obj::ObjLoader;

use thiserror::Error;

/// Errors from decoding asset data
#[derive(Error, Debug)]
pub enum FormatError {
    /// IO error reading the source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File does not start with the expected magic
    #[error("Bad magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        /// Magic of the format being read
        expected: [u8; 4],
        /// First bytes of the input
        found: [u8; 4],
    },

    /// Input ended inside a field
    #[error("Truncated input while reading {0}")]
    Truncated(&'static str),

    /// A count that cannot fit in the remaining input
    #[error("Invalid {field} count {count}")]
    InvalidCount {
        /// Field the count belongs to
        field: &'static str,
        /// Count read from the input
        count: u32,
    },

    /// Bytes left after the last field
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),

    /// Text format parse failure
    #[error("Parse error: {0}")]
    Parse(String),

    /// Image decoding failure
    #[error("Image error: {0}")]
    Image(String),
}
