//! Backend-agnostic graphics API
//!
//! Descriptions, handles, components and the [`GraphicsBackend`] trait, plus
//! the pure bookkeeping every backend shares: the pass state machine, the
//! command ring, the pipeline cache, cascade fitting and the bake schedule.

pub mod backend;
pub mod bake;
pub mod cascades;
pub mod components;
pub mod desc;
pub mod error;
pub mod forward;
pub mod frame;
pub mod handles;
pub mod limits;
pub mod material_layout;
pub mod null;
pub mod pass;
pub mod pipeline_key;
pub mod postprocess;
pub mod uniforms;
pub mod viewport_layout;

#[cfg(test)]
mod tests;

pub use backend::GraphicsBackend;
pub use components::{Camera, DirectionalLight, Geometry, Light, PointLight, Transform};
pub use desc::{
    EnvironmentDesc, Filter, MaterialDesc, MaterialFlags, MaterialMaps, PixelFormat, TextureDesc,
    TextureKind, TextureRegion, ViewportDesc, Wrap,
};
pub use error::{RenderError, RenderResult};
pub use handles::{EnvironmentHandle, MaterialHandle, MeshHandle, TextureHandle, ViewportHandle};
pub use limits::GraphicsLimits;
pub use null::NullBackend;
pub use pass::{PassKind, PassState, PassTracker};
