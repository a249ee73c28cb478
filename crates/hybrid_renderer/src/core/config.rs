//! # Renderer Configuration
//!
//! Settings consumed when a backend is constructed: instance metadata,
//! shader location, shadow and image-based-lighting resolutions. Loaded
//! from `.toml`/`.ron` through [`Config`], validated before use.

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};
use crate::graphics::limits::GraphicsLimits;

/// Preferred swapchain present mode, falling back to FIFO when unsupported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentModePreference {
    /// Low latency triple buffering
    Mailbox,
    /// Vsync, always available
    Fifo,
    /// No vsync, may tear
    Immediate,
}

/// Cascaded shadow map settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Width and height of each cascade layer
    pub map_size: u32,
    /// Cascades rendered per view
    pub cascade_count: u32,
    /// Blend between uniform (0) and logarithmic (1) split placement
    pub split_lambda: f32,
    /// Distance from the camera covered by the last cascade
    pub max_distance: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            map_size: 2048,
            cascade_count: GraphicsLimits::MAX_SHADOW_CASCADES,
            split_lambda: 0.75,
            max_distance: 100.0,
        }
    }
}

/// Image based lighting bake resolutions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IblConfig {
    /// Face size of the diffuse irradiance cube
    pub irradiance_size: u32,
    /// Face size of mip 0 of the prefiltered specular cube
    pub prefilter_size: u32,
    /// Roughness bands baked into the prefiltered cube
    pub prefilter_mips: u32,
    /// Size of the split-sum BRDF lookup table
    pub brdf_lut_size: u32,
}

impl Default for IblConfig {
    fn default() -> Self {
        Self {
            irradiance_size: 64,
            prefilter_size: 128,
            prefilter_mips: 6,
            brdf_lut_size: 512,
        }
    }
}

/// # Renderer Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Whether to enable Vulkan validation layers, `None` follows the build type
    pub enable_validation: Option<bool>,
    /// Directory holding the compiled `*.spv` shaders
    pub shader_dir: String,
    /// Preferred present mode
    pub present_mode: PresentModePreference,
    /// Clear color of the composition target where nothing is drawn
    pub clear_color: [f32; 4],
    /// Exposure applied by the tonemapping step
    pub exposure: f32,
    /// Shadow settings
    pub shadows: ShadowConfig,
    /// IBL settings
    pub ibl: IblConfig,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            enable_validation: None,
            shader_dir: "target/shaders".to_string(),
            present_mode: PresentModePreference::Mailbox,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            exposure: 1.0,
            shadows: ShadowConfig::default(),
            ibl: IblConfig::default(),
        }
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set the compiled shader directory
    pub fn with_shader_dir(mut self, dir: impl Into<String>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Set the preferred present mode
    pub fn with_present_mode(mut self, mode: PresentModePreference) -> Self {
        self.present_mode = mode;
        self
    }

    /// Set shadow settings
    pub fn with_shadows(mut self, shadows: ShadowConfig) -> Self {
        self.shadows = shadows;
        self
    }

    /// Set IBL settings
    pub fn with_ibl(mut self, ibl: IblConfig) -> Self {
        self.ibl = ibl;
        self
    }

    /// Validation layers requested, resolving `None` to the build type
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }

        let shadows = &self.shadows;
        if shadows.cascade_count == 0 || shadows.cascade_count > GraphicsLimits::MAX_SHADOW_CASCADES {
            return Err(ConfigError::Invalid(format!(
                "Cascade count must be in 1..={}, got {}",
                GraphicsLimits::MAX_SHADOW_CASCADES,
                shadows.cascade_count
            )));
        }
        if shadows.map_size == 0 {
            return Err(ConfigError::Invalid("Shadow map size must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&shadows.split_lambda) {
            return Err(ConfigError::Invalid(format!(
                "Split lambda must be in [0, 1], got {}",
                shadows.split_lambda
            )));
        }
        if shadows.max_distance <= 0.0 {
            return Err(ConfigError::Invalid("Shadow distance must be positive".to_string()));
        }

        let ibl = &self.ibl;
        if ibl.irradiance_size == 0 || ibl.prefilter_size == 0 || ibl.brdf_lut_size == 0 {
            return Err(ConfigError::Invalid("IBL sizes must be non-zero".to_string()));
        }
        let max_mips = 32 - ibl.prefilter_size.leading_zeros();
        if ibl.prefilter_mips == 0 || ibl.prefilter_mips > max_mips {
            return Err(ConfigError::Invalid(format!(
                "Prefilter mips must be in 1..={} for size {}, got {}",
                max_mips, ibl.prefilter_size, ibl.prefilter_mips
            )));
        }

        if self.exposure <= 0.0 {
            return Err(ConfigError::Invalid("Exposure must be positive".to_string()));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Hybrid Renderer")
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok(), "defaults should validate");
        assert_eq!(config.ibl.irradiance_size, 64);
        assert_eq!(config.ibl.prefilter_size, 128);
        assert_eq!(config.ibl.prefilter_mips, 6);
        assert_eq!(config.shadows.cascade_count, 4);
    }

    #[test]
    fn test_rejects_too_many_cascades() {
        let config = RendererConfig::default().with_shadows(ShadowConfig {
            cascade_count: 5,
            ..ShadowConfig::default()
        });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_more_mips_than_the_chain_allows() {
        let config = RendererConfig::default().with_ibl(IblConfig {
            prefilter_size: 16,
            prefilter_mips: 6,
            ..IblConfig::default()
        });
        assert!(config.validate().is_err(), "16px has only 5 mip levels");
    }

    #[test]
    fn test_toml_round_trip_keeps_values() {
        let config = RendererConfig::new("viewer")
            .with_shader_dir("shaders")
            .with_present_mode(PresentModePreference::Fifo);
        let text = toml::to_string_pretty(&config).expect("serialize");
        let parsed: RendererConfig = toml::from_str(&text).expect("parse");
        assert_eq!(parsed.application_name, "viewer");
        assert_eq!(parsed.shader_dir, "shaders");
        assert_eq!(parsed.present_mode, PresentModePreference::Fifo);
    }

    #[test]
    fn test_partial_ron_falls_back_to_defaults() {
        let parsed: RendererConfig = ron::from_str("(exposure: 2.0)").expect("parse");
        assert_eq!(parsed.exposure, 2.0);
        assert_eq!(parsed.ibl.prefilter_mips, 6);
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let result = RendererConfig::load_from_file("renderer.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
