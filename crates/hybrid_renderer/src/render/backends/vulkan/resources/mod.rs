//! Vulkan resource management
//!
//! Buffers and images at the bottom, then the objects the resource
//! factories hand out handles to.

/// Buffers and memory type selection
pub mod buffer;

/// Images, views and layout transitions
pub mod image;

/// Sampled textures
pub mod texture;

/// Descriptor set layouts, pools and writes
pub mod descriptor_set;

/// Material uniform and sampler bindings
pub mod material;

/// Vertex and index buffers with LOD ranges
pub mod mesh;

/// Baked environment cubes
pub mod environment;

/// Per-viewport render targets
pub mod viewport;

/// Cascaded shadow map
pub mod shadow;

/// Per-frame uniform buffers
pub mod uniforms;
