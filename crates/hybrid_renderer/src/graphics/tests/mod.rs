//! Behaviour of the pass protocol and resource factories against the null backend

mod command_ring;
mod environment;
mod forward_order;
mod pass_protocol;
mod resources;
mod viewport;

use super::null::NullBackend;
use super::*;
use crate::assets::mesh::{MeshData, Vertex};
use crate::core::config::RendererConfig;

pub(super) fn backend() -> NullBackend {
    NullBackend::new(RendererConfig::default()).unwrap()
}

pub(super) fn triangle() -> MeshData {
    MeshData::new(
        vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0], [0.0, 0.0, 1.0]),
            Vertex::new([1.0, 0.0, 0.0], [1.0, 0.0], [0.0, 0.0, 1.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 1.0], [0.0, 0.0, 1.0]),
        ],
        vec![0, 1, 2],
    )
}

/// A mesh with one opaque and one translucent material
pub(super) struct Fixture {
    pub viewport: ViewportHandle,
    pub opaque: Geometry,
    pub translucent: Geometry,
}

pub(super) fn fixture(backend: &mut NullBackend) -> Fixture {
    let mesh = backend.make_mesh(&triangle()).unwrap();
    let opaque = backend.make_material(&MaterialDesc::default()).unwrap();
    let translucent = backend
        .make_material(&MaterialDesc {
            translucent: true,
            ..MaterialDesc::default()
        })
        .unwrap();
    Fixture {
        viewport: backend.make_viewport(&ViewportDesc::new(320, 240)).unwrap(),
        opaque: Geometry {
            mesh,
            material: opaque,
        },
        translucent: Geometry {
            mesh,
            material: translucent,
        },
    }
}

pub(super) fn cube_texture(backend: &mut NullBackend, size: u32) -> TextureHandle {
    backend.make_texture(&TextureDesc::cube(size, PixelFormat::Rgba8)).unwrap()
}
