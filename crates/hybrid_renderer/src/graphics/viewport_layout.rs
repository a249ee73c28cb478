//! Intermediate images owned by a viewport

use super::desc::PixelFormat;

/// Role of a viewport image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRole {
    /// Base color and metalness
    AlbedoMetallic,
    /// World normal and roughness
    NormalRoughness,
    /// Emission and ambient occlusion
    EmissiveOcclusion,
    /// Shared depth of the depth and forward passes
    Depth,
    /// Accumulated lighting
    Light,
    /// Composition, skybox and forward shading
    Forward,
    /// First postprocess ping-pong image
    PostA,
    /// Second postprocess ping-pong image
    PostB,
    /// Tone-mapped output copied to the swapchain
    Fill,
}

/// One image of a viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    /// What the image holds
    pub role: TargetRole,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: PixelFormat,
}

/// Every image a viewport of a given size allocates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewportLayout {
    width: u32,
    height: u32,
    targets: Vec<TargetInfo>,
}

impl ViewportLayout {
    /// Roles in allocation order
    pub const ROLES: [(TargetRole, PixelFormat); 9] = [
        (TargetRole::AlbedoMetallic, PixelFormat::Rgba8),
        (TargetRole::NormalRoughness, PixelFormat::Rgba16F),
        (TargetRole::EmissiveOcclusion, PixelFormat::Rgba8),
        (TargetRole::Depth, PixelFormat::D32),
        (TargetRole::Light, PixelFormat::Rgba16F),
        (TargetRole::Forward, PixelFormat::Rgba16F),
        (TargetRole::PostA, PixelFormat::Rgba16F),
        (TargetRole::PostB, PixelFormat::Rgba16F),
        (TargetRole::Fill, PixelFormat::Rgba8Srgb),
    ];

    /// Layout for a viewport of the given size
    pub fn new(width: u32, height: u32) -> Self {
        let targets = Self::ROLES
            .iter()
            .map(|&(role, format)| TargetInfo {
                role,
                width,
                height,
                format,
            })
            .collect();
        Self {
            width,
            height,
            targets,
        }
    }

    /// Viewport width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Viewport height
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Every image
    pub fn targets(&self) -> &[TargetInfo] {
        &self.targets
    }

    /// The image with `role`
    pub fn target(&self, role: TargetRole) -> Option<&TargetInfo> {
        self.targets.iter().find(|t| t.role == role)
    }

    /// Gbuffer color attachments in attachment order
    pub fn gbuffer(&self) -> impl Iterator<Item = &TargetInfo> {
        self.targets.iter().filter(|t| {
            matches!(
                t.role,
                TargetRole::AlbedoMetallic | TargetRole::NormalRoughness | TargetRole::EmissiveOcclusion
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_image_matches_the_viewport() {
        let layout = ViewportLayout::new(1280, 720);
        assert_eq!(layout.targets().len(), 9);
        assert!(layout.targets().iter().all(|t| t.width == 1280 && t.height == 720));
        assert_eq!(layout.gbuffer().count(), 3);
        assert_eq!(layout.target(TargetRole::Depth).map(|t| t.format), Some(PixelFormat::D32));
    }
}
