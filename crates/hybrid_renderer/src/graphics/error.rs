//! Renderer error type

use thiserror::Error;

use super::pass::{PassKind, PassState};
use crate::assets::FormatError;
use crate::config::ConfigError;
use crate::render::backends::vulkan::VulkanError;

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors surfaced by a [`GraphicsBackend`](super::GraphicsBackend)
///
/// `Vulkan` wraps a failed API call and is fatal by policy: there is no
/// recovery path once the device reports an error. Every other variant is
/// a precondition violation that leaves the backend usable.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A Vulkan call failed
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// `update` called on a texture created without `is_mutable`
    #[error("Texture was not created mutable and cannot be updated")]
    TextureNotMutable,

    /// `update` given more bytes than the texture holds
    #[error("Texture update of {requested} bytes exceeds allocated {capacity} bytes")]
    TextureUpdateOverflow {
        /// Bytes passed to the update
        requested: usize,
        /// Bytes allocated for the texture's base level
        capacity: usize,
    },

    /// `update` region outside the texture or not covered by the pixel data
    #[error("Invalid texture region: {0}")]
    InvalidTextureRegion(String),

    /// Descriptor that cannot produce a texture
    #[error("Invalid texture description: {0}")]
    InvalidTexture(String),

    /// Mesh data that breaks a mesh invariant
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Material description that cannot be bound
    #[error("Invalid material: {0}")]
    InvalidMaterial(String),

    /// Environment source texture is not a cubemap
    #[error("Environment source texture must be a cubemap")]
    NotACubemap,

    /// Viewport with a zero dimension
    #[error("Invalid viewport size {width}x{height}")]
    InvalidViewport {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// Handle does not name a live resource
    #[error("{kind} not found (destroyed or never created)")]
    ResourceNotFound {
        /// Resource kind
        kind: &'static str,
    },

    /// Pass begun or ended out of order
    #[error("Cannot {action} while {state}")]
    InvalidPassTransition {
        /// Attempted transition
        action: &'static str,
        /// State at the time of the call
        state: PassState,
    },

    /// Draw or light call issued outside the pass it belongs to
    #[error("{call} requires an open {expected:?} pass, current state is {state}")]
    DrawOutsidePass {
        /// Offending call
        call: &'static str,
        /// Pass the call belongs to
        expected: PassKind,
        /// State at the time of the call
        state: PassState,
    },

    /// Shadow cascade index outside the supported range
    #[error("Shadow cascade {cascade} out of range (max {max})")]
    CascadeOutOfRange {
        /// Requested cascade
        cascade: u32,
        /// Number of supported cascades
        max: u32,
    },

    /// Shadow cascade rendered twice in one view
    #[error("Shadow cascade {0} already rendered in this view")]
    DuplicateCascade(u32),

    /// Shadow cascade begun before every lower cascade of the view
    #[error("Shadow cascade {cascade} begun before cascade {expected}")]
    CascadeOutOfOrder {
        /// Requested cascade
        cascade: u32,
        /// Next cascade the view may render
        expected: u32,
    },

    /// Postprocess effect drawn without `next_postprocess_pass`, or a step left empty
    #[error("Postprocess step mismatch: {0}")]
    PostprocessStep(&'static str),

    /// GPU work did not finish within the fence timeout
    #[error("Timed out after {timeout_ns} ns waiting for {what}")]
    Timeout {
        /// What was waited on
        what: &'static str,
        /// Timeout used
        timeout_ns: u64,
    },

    /// `present` without a finished frame to show
    #[error("Nothing to present: {0}")]
    NothingToPresent(&'static str),

    /// Binary asset decoding failed
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Renderer configuration rejected at startup
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Shader missing or unloadable
    #[error("Shader error: {0}")]
    Shader(String),
}
