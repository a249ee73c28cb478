//! Draw schedule of the environment bake

use crate::core::config::IblConfig;

/// Cube faces rendered per map and mip
pub const CUBE_FACES: u32 = 6;

/// Which derived map a bake step renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeTarget {
    /// Diffuse irradiance convolution
    Irradiance,
    /// Specular prefilter for one roughness band
    Prefilter,
}

/// One full-screen draw of the bake
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakeStep {
    /// Destination map
    pub target: BakeTarget,
    /// Destination mip
    pub mip: u32,
    /// Destination face, +X -X +Y -Y +Z -Z
    pub face: u32,
    /// Face size at `mip`
    pub size: u32,
    /// Roughness pushed to the prefilter shader
    pub roughness: f32,
}

/// Every draw needed to derive an environment from its skybox
#[derive(Debug, Clone, PartialEq)]
pub struct BakePlan {
    irradiance_size: u32,
    prefilter_size: u32,
    prefilter_mips: u32,
    steps: Vec<BakeStep>,
}

impl BakePlan {
    /// Irradiance faces first, then every prefilter mip from largest to smallest
    pub fn new(irradiance_size: u32, prefilter_size: u32, prefilter_mips: u32) -> Self {
        let irradiance = (0..CUBE_FACES).map(|face| BakeStep {
            target: BakeTarget::Irradiance,
            mip: 0,
            face,
            size: irradiance_size,
            roughness: 0.0,
        });
        let prefilter = (0..prefilter_mips).flat_map(move |mip| {
            (0..CUBE_FACES).map(move |face| BakeStep {
                target: BakeTarget::Prefilter,
                mip,
                face,
                size: mip_size(prefilter_size, mip),
                roughness: mip as f32 / prefilter_mips as f32,
            })
        });

        Self {
            irradiance_size,
            prefilter_size,
            prefilter_mips,
            steps: irradiance.chain(prefilter).collect(),
        }
    }

    /// Plan for the configured sizes
    pub fn from_config(config: &IblConfig) -> Self {
        Self::new(config.irradiance_size, config.prefilter_size, config.prefilter_mips)
    }

    /// Steps in submission order
    pub fn steps(&self) -> &[BakeStep] {
        &self.steps
    }

    /// Face size of the irradiance cube
    pub fn irradiance_size(&self) -> u32 {
        self.irradiance_size
    }

    /// Face size of mip 0 of the prefiltered cube
    pub fn prefilter_size(&self) -> u32 {
        self.prefilter_size
    }

    /// Mips of the prefiltered cube
    pub fn prefilter_mips(&self) -> u32 {
        self.prefilter_mips
    }
}

/// Size of `mip` for a base size, never below one texel
pub fn mip_size(base: u32, mip: u32) -> u32 {
    base.checked_shr(mip).unwrap_or(0).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_plan_has_42_draws() {
        let plan = BakePlan::from_config(&IblConfig::default());
        assert_eq!(plan.steps().len(), 6 + 36);

        let irradiance: Vec<_> = plan
            .steps()
            .iter()
            .filter(|s| s.target == BakeTarget::Irradiance)
            .collect();
        assert_eq!(irradiance.len(), 6);
        assert!(irradiance.iter().all(|s| s.size == 64 && s.mip == 0));
    }

    #[test]
    fn test_prefilter_mips_halve_and_ramp_roughness() {
        let plan = BakePlan::new(64, 128, 6);
        let prefilter: Vec<_> = plan
            .steps()
            .iter()
            .filter(|s| s.target == BakeTarget::Prefilter && s.face == 0)
            .collect();
        let sizes: Vec<u32> = prefilter.iter().map(|s| s.size).collect();
        assert_eq!(sizes, vec![128, 64, 32, 16, 8, 4]);
        assert_relative_eq!(prefilter[0].roughness, 0.0);
        assert_relative_eq!(prefilter[3].roughness, 0.5);
    }

    #[test]
    fn test_mip_size_clamps_to_one() {
        assert_eq!(mip_size(4, 5), 1);
        assert_eq!(mip_size(1, 40), 1);
    }
}
