//! Fixed limits shared by every backend

/// Compile-time limits of the renderer
#[derive(Debug, Clone, Copy)]
pub struct GraphicsLimits;

impl GraphicsLimits {
    /// Cascades a single shadow-casting directional light may use
    pub const MAX_SHADOW_CASCADES: u32 = 4;
    /// Point lights collected per view for forward shading
    pub const MAX_POINT_LIGHTS: usize = 64;
    /// Directional lights collected per view for forward shading
    pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
    /// Optional texture maps a material may carry
    pub const MAX_MATERIAL_MAPS: usize = 6;
    /// Command buffers (and fences) in the frame ring
    pub const COMMAND_RING_SIZE: usize = 3;
    /// Upper bound for every fence wait, in nanoseconds
    pub const FENCE_TIMEOUT_NS: u64 = 1_000_000_000;
}
