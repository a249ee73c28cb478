//! # Hybrid Renderer
//!
//! A multi-pass deferred/forward hybrid renderer with a Vulkan backend.
//!
//! ## Features
//!
//! - **Backend-agnostic API**: the [`GraphicsBackend`](graphics::GraphicsBackend) trait with
//!   Vulkan and recording backends
//! - **Deferred lighting**: gbuffer depth pass, cascaded shadows and light accumulation
//! - **Forward composition**: skybox, forward shaded and translucent geometry
//! - **Image based lighting**: irradiance and prefiltered environment bakes
//! - **Postprocess chain**: ping-pong effects with a final tonemap
//! - **Mesh preprocessing**: LODs, clusters, convex hull and bounds
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hybrid_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut backend = NullBackend::new(RendererConfig::default())?;
//!     let viewport = backend.make_viewport(&ViewportDesc::new(1280, 720))?;
//!     let view = SceneView::new(viewport, Transform::identity(), Camera::default());
//!     render_frame(&mut backend, &[view], viewport)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc
)]

pub mod core;

pub mod assets;
pub mod config;
pub mod foundation;
pub mod graphics;
pub mod render;
pub mod scene;

/// Commonly used types
pub mod prelude {
    pub use crate::assets::{MeshBuildOptions, MeshData, Vertex};
    pub use crate::core::config::RendererConfig;
    pub use crate::foundation::math::{Transform, Vec3};
    pub use crate::graphics::{
        Camera, DirectionalLight, EnvironmentDesc, Geometry, GraphicsBackend, Light,
        MaterialDesc, NullBackend, PointLight, RenderError, RenderResult, TextureDesc,
        ViewportDesc,
    };
    pub use crate::render::backends::vulkan::VulkanBackend;
    pub use crate::scene::{render_frame, render_view, Drawable, PostEffect, SceneLight, SceneView};
}
