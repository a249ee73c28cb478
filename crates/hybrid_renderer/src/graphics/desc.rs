//! Plain-data descriptions consumed by the resource factories

use bitflags::bitflags;

use super::error::{RenderError, RenderResult};
use super::handles::TextureHandle;
use super::limits::GraphicsLimits;

/// Pixel formats a texture may be created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// One 8-bit channel
    R8,
    /// Two 8-bit channels
    Rg8,
    /// Four 8-bit linear channels
    Rgba8,
    /// Four 8-bit sRGB encoded channels
    Rgba8Srgb,
    /// Two 16-bit float channels
    Rg16F,
    /// Four 16-bit float channels
    Rgba16F,
    /// Four 32-bit float channels
    Rgba32F,
    /// BC1 block compressed
    Bc1,
    /// BC3 block compressed
    Bc3,
    /// 24-bit depth with 8-bit stencil
    D24S8,
    /// 32-bit float depth
    D32,
}

impl PixelFormat {
    /// Edge length of a compression block (1 for uncompressed formats)
    pub const fn block_dim(self) -> u32 {
        match self {
            Self::Bc1 | Self::Bc3 => 4,
            _ => 1,
        }
    }

    /// Bytes per block (per pixel for uncompressed formats)
    pub const fn block_bytes(self) -> usize {
        match self {
            Self::R8 => 1,
            Self::Rg8 => 2,
            Self::Rgba8 | Self::Rgba8Srgb | Self::Rg16F | Self::D24S8 | Self::D32 => 4,
            Self::Rgba16F | Self::Bc1 => 8,
            Self::Rgba32F | Self::Bc3 => 16,
        }
    }

    /// Whether this is a depth format
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::D24S8 | Self::D32)
    }

    /// Whether this format is block compressed
    pub const fn is_compressed(self) -> bool {
        self.block_dim() > 1
    }

    /// Bytes needed for one `width`x`height` image
    pub fn image_bytes(self, width: u32, height: u32) -> usize {
        let dim = self.block_dim();
        let blocks_x = width.div_ceil(dim) as usize;
        let blocks_y = height.div_ceil(dim) as usize;
        blocks_x * blocks_y * self.block_bytes()
    }
}

/// Sampler filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    /// Nearest texel
    Nearest,
    /// Bilinear, trilinear between mips
    #[default]
    Linear,
}

/// Sampler addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    /// Tile
    #[default]
    Repeat,
    /// Tile mirrored
    MirroredRepeat,
    /// Clamp to the edge texel
    ClampToEdge,
}

/// Image dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureKind {
    /// Single 2D image
    #[default]
    Flat,
    /// Six square faces (+X, -X, +Y, -Y, +Z, -Z)
    Cube,
}

impl TextureKind {
    /// Array layers backing the image
    pub const fn layers(self) -> u32 {
        match self {
            Self::Flat => 1,
            Self::Cube => 6,
        }
    }
}

/// Sub-rectangle of a texture's base level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRegion {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl TextureRegion {
    /// Region at `(x, y)` of the given size
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Everything needed to create a texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: PixelFormat,
    /// Sampler filter
    pub filter: Filter,
    /// Sampler addressing
    pub wrap: Wrap,
    /// Mip levels to allocate; levels past 0 are generated from level 0
    pub mip_levels: u32,
    /// Flat or cube
    pub kind: TextureKind,
    /// Allow `update_texture` after creation
    pub is_mutable: bool,
    /// Allow rendering into the texture
    pub is_render_target: bool,
    /// Base level pixels for every layer, tightly packed; empty leaves the image uninitialized
    pub pixels: Vec<u8>,
}

impl TextureDesc {
    /// Flat, single-mip, immutable texture without initial data
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            filter: Filter::default(),
            wrap: Wrap::default(),
            mip_levels: 1,
            kind: TextureKind::Flat,
            is_mutable: false,
            is_render_target: false,
            pixels: Vec::new(),
        }
    }

    /// Cube texture with square faces
    pub fn cube(size: u32, format: PixelFormat) -> Self {
        Self {
            kind: TextureKind::Cube,
            wrap: Wrap::ClampToEdge,
            ..Self::new(size, size, format)
        }
    }

    /// Set initial pixels
    pub fn with_pixels(mut self, pixels: Vec<u8>) -> Self {
        self.pixels = pixels;
        self
    }

    /// Set the mip count
    pub fn with_mips(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// Allocate every mip down to 1x1
    pub fn with_full_mip_chain(mut self) -> Self {
        self.mip_levels = full_mip_count(self.width, self.height);
        self
    }

    /// Set filtering
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Set addressing
    pub fn with_wrap(mut self, wrap: Wrap) -> Self {
        self.wrap = wrap;
        self
    }

    /// Allow updates
    pub fn mutable(mut self) -> Self {
        self.is_mutable = true;
        self
    }

    /// Allow rendering into the texture
    pub fn render_target(mut self) -> Self {
        self.is_render_target = true;
        self
    }

    /// Bytes of one layer's base level
    pub fn layer_bytes(&self) -> usize {
        self.format.image_bytes(self.width, self.height)
    }

    /// Bytes of the base level across all layers, the capacity seen by updates
    pub fn base_level_bytes(&self) -> usize {
        self.layer_bytes() * self.kind.layers() as usize
    }

    /// Check the description can be turned into an image
    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidTexture(format!(
                "size {}x{} has a zero dimension",
                self.width, self.height
            )));
        }
        if self.kind == TextureKind::Cube && self.width != self.height {
            return Err(RenderError::InvalidTexture("cube faces must be square".to_string()));
        }
        let max_mips = full_mip_count(self.width, self.height);
        if self.mip_levels == 0 || self.mip_levels > max_mips {
            return Err(RenderError::InvalidTexture(format!(
                "mip count {} outside 1..={}",
                self.mip_levels, max_mips
            )));
        }
        if self.mip_levels > 1 && (self.format.is_compressed() || self.format.is_depth()) {
            return Err(RenderError::InvalidTexture(format!(
                "{:?} cannot generate mips",
                self.format
            )));
        }
        if !self.pixels.is_empty() && self.pixels.len() != self.base_level_bytes() {
            return Err(RenderError::InvalidTexture(format!(
                "expected {} bytes of pixels, got {}",
                self.base_level_bytes(),
                self.pixels.len()
            )));
        }
        Ok(())
    }

    /// Preconditions of `update_texture`, checked before anything touches the GPU
    pub fn check_update(&self, byte_count: usize, region: TextureRegion) -> RenderResult<()> {
        if !self.is_mutable {
            return Err(RenderError::TextureNotMutable);
        }
        let capacity = self.base_level_bytes();
        if byte_count > capacity {
            return Err(RenderError::TextureUpdateOverflow {
                requested: byte_count,
                capacity,
            });
        }
        if region.width == 0
            || region.height == 0
            || region.x.saturating_add(region.width) > self.width
            || region.y.saturating_add(region.height) > self.height
        {
            return Err(RenderError::InvalidTextureRegion(format!(
                "{:?} outside {}x{}",
                region, self.width, self.height
            )));
        }
        let dim = self.format.block_dim();
        if dim > 1 && (region.x % dim != 0 || region.y % dim != 0) {
            return Err(RenderError::InvalidTextureRegion(format!(
                "{:?} not aligned to {}x{} blocks",
                region, dim, dim
            )));
        }
        let needed = self.format.image_bytes(region.width, region.height);
        if byte_count < needed {
            return Err(RenderError::InvalidTextureRegion(format!(
                "{:?} needs {} bytes, got {}",
                region, needed, byte_count
            )));
        }
        Ok(())
    }
}

/// Mip levels of a full chain for the given size
pub fn full_mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

bitflags! {
    /// Material switches and which texture maps are present
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        /// Alpha blended, drawn after opaque geometry
        const TRANSLUCENT = 1 << 0;
        /// No back-face culling
        const DOUBLE_SIDED = 1 << 1;
        /// Rasterized as lines
        const WIREFRAME = 1 << 2;

        /// Albedo map present
        const ALBEDO_MAP = 1 << 8;
        /// Normal map present
        const NORMAL_MAP = 1 << 9;
        /// Roughness map present
        const ROUGHNESS_MAP = 1 << 10;
        /// Metallic map present
        const METALLIC_MAP = 1 << 11;
        /// Emissive map present
        const EMISSIVE_MAP = 1 << 12;
        /// Ambient occlusion map present
        const AMBIENT_MAP = 1 << 13;

        /// Every map bit
        const ALL_MAPS = Self::ALBEDO_MAP.bits()
            | Self::NORMAL_MAP.bits()
            | Self::ROUGHNESS_MAP.bits()
            | Self::METALLIC_MAP.bits()
            | Self::EMISSIVE_MAP.bits()
            | Self::AMBIENT_MAP.bits();
    }
}

impl MaterialFlags {
    /// Map bits in binding order
    pub const MAP_ORDER: [Self; GraphicsLimits::MAX_MATERIAL_MAPS] = [
        Self::ALBEDO_MAP,
        Self::NORMAL_MAP,
        Self::ROUGHNESS_MAP,
        Self::METALLIC_MAP,
        Self::EMISSIVE_MAP,
        Self::AMBIENT_MAP,
    ];

    /// Only the map bits
    pub fn maps(self) -> Self {
        self & Self::ALL_MAPS
    }

    /// Number of maps present
    pub fn map_count(self) -> u32 {
        self.maps().bits().count_ones()
    }
}

/// Optional texture maps of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialMaps {
    /// Base color
    pub albedo: Option<TextureHandle>,
    /// Tangent space normals
    pub normal: Option<TextureHandle>,
    /// Roughness
    pub roughness: Option<TextureHandle>,
    /// Metalness
    pub metallic: Option<TextureHandle>,
    /// Emission
    pub emissive: Option<TextureHandle>,
    /// Ambient occlusion
    pub ambient: Option<TextureHandle>,
}

impl MaterialMaps {
    /// Maps in binding order, absent ones as `None`
    pub fn in_order(&self) -> [Option<TextureHandle>; GraphicsLimits::MAX_MATERIAL_MAPS] {
        [
            self.albedo,
            self.normal,
            self.roughness,
            self.metallic,
            self.emissive,
            self.ambient,
        ]
    }

    /// Present maps in binding order
    pub fn present(&self) -> Vec<TextureHandle> {
        self.in_order().into_iter().flatten().collect()
    }
}

/// Everything needed to create a material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDesc {
    /// Linear base color and alpha
    pub base_color: [f32; 4],
    /// Perceptual roughness
    pub roughness: f32,
    /// Metalness
    pub metallic: f32,
    /// How strongly the ambient map darkens indirect light
    pub occlusion_strength: f32,
    /// Alpha blended
    pub translucent: bool,
    /// Disable back-face culling
    pub double_sided: bool,
    /// Draw as lines
    pub wireframe: bool,
    /// Texture maps
    pub maps: MaterialMaps,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            roughness: 0.5,
            metallic: 0.0,
            occlusion_strength: 1.0,
            translucent: false,
            double_sided: false,
            wireframe: false,
            maps: MaterialMaps::default(),
        }
    }
}

impl MaterialDesc {
    /// Flag bits derived from the switches and present maps
    pub fn flags(&self) -> MaterialFlags {
        let mut flags = MaterialFlags::empty();
        flags.set(MaterialFlags::TRANSLUCENT, self.translucent);
        flags.set(MaterialFlags::DOUBLE_SIDED, self.double_sided);
        flags.set(MaterialFlags::WIREFRAME, self.wireframe);
        for (bit, map) in MaterialFlags::MAP_ORDER.iter().zip(self.maps.in_order()) {
            flags.set(*bit, map.is_some());
        }
        flags
    }

    /// Reject values the shaders cannot make sense of
    pub fn validate(&self) -> RenderResult<()> {
        if self.base_color.iter().any(|c| !c.is_finite()) {
            return Err(RenderError::InvalidMaterial("base color is not finite".to_string()));
        }
        for (name, value) in [
            ("roughness", self.roughness),
            ("metallic", self.metallic),
            ("occlusion_strength", self.occlusion_strength),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RenderError::InvalidMaterial(format!(
                    "{name} {value} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Everything needed to create an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentDesc {
    /// Source cube texture the derived maps are baked from
    pub skybox: TextureHandle,
}

/// Everything needed to create a viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportDesc {
    /// Output width
    pub width: u32,
    /// Output height
    pub height: u32,
}

impl ViewportDesc {
    /// Viewport of the given size
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immutable_texture_rejects_update() {
        let desc = TextureDesc::new(4, 4, PixelFormat::Rgba8);
        let result = desc.check_update(16, TextureRegion::new(0, 0, 2, 2));
        assert!(matches!(result, Err(RenderError::TextureNotMutable)));
    }

    #[test]
    fn test_oversized_update_overflows() {
        let desc = TextureDesc::new(4, 4, PixelFormat::Rgba8).mutable();
        let result = desc.check_update(65, TextureRegion::new(0, 0, 4, 4));
        assert!(matches!(
            result,
            Err(RenderError::TextureUpdateOverflow { requested: 65, capacity: 64 })
        ));
    }

    #[test]
    fn test_region_must_fit_and_be_covered() {
        let desc = TextureDesc::new(4, 4, PixelFormat::Rgba8).mutable();
        assert!(desc.check_update(16, TextureRegion::new(3, 3, 2, 2)).is_err());
        assert!(desc.check_update(8, TextureRegion::new(0, 0, 2, 2)).is_err());
        assert!(desc.check_update(16, TextureRegion::new(2, 2, 2, 2)).is_ok());
    }

    #[test]
    fn test_compressed_sizes_round_up_to_blocks() {
        assert_eq!(PixelFormat::Bc1.image_bytes(5, 5), 4 * 8);
        assert_eq!(PixelFormat::Bc3.image_bytes(4, 4), 16);
        assert_eq!(PixelFormat::Rgba16F.image_bytes(2, 3), 48);
    }

    #[test]
    fn test_cube_capacity_counts_six_faces() {
        let desc = TextureDesc::cube(8, PixelFormat::Rgba8);
        assert_eq!(desc.base_level_bytes(), 8 * 8 * 4 * 6);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_mips_and_pixels() {
        assert!(TextureDesc::new(4, 4, PixelFormat::Rgba8).with_mips(4).validate().is_err());
        assert!(TextureDesc::new(4, 4, PixelFormat::Rgba8).with_mips(3).validate().is_ok());
        assert!(TextureDesc::new(4, 4, PixelFormat::Rgba8)
            .with_pixels(vec![0; 10])
            .validate()
            .is_err());
    }

    #[test]
    fn test_full_mip_count() {
        assert_eq!(full_mip_count(1, 1), 1);
        assert_eq!(full_mip_count(512, 256), 10);
        assert_eq!(full_mip_count(5, 3), 3);
    }

    #[test]
    fn test_material_flags_follow_maps() {
        let mut slots: slotmap::SlotMap<TextureHandle, ()> = slotmap::SlotMap::with_key();
        let normal = slots.insert(());
        let desc = MaterialDesc {
            translucent: true,
            maps: MaterialMaps {
                normal: Some(normal),
                ..MaterialMaps::default()
            },
            ..MaterialDesc::default()
        };
        let flags = desc.flags();
        assert!(flags.contains(MaterialFlags::TRANSLUCENT | MaterialFlags::NORMAL_MAP));
        assert!(!flags.contains(MaterialFlags::ALBEDO_MAP));
        assert_eq!(flags.map_count(), 1);
        assert_eq!(desc.maps.present(), vec![normal]);
    }
}
