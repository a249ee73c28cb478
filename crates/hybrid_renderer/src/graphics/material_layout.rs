//! Descriptor shape of a material

use super::desc::MaterialFlags;
use super::limits::GraphicsLimits;

/// Binding of the material uniform buffer
pub const MATERIAL_UNIFORM_BINDING: u32 = 0;
/// Binding of the map sampler array
pub const MATERIAL_MAPS_BINDING: u32 = 1;

/// Bindings and sampler array slots derived from a material's map bits
///
/// Binding 0 always holds the scalars. Binding 1 exists only when at least
/// one map is present and is an array of exactly `map_count` samplers in
/// map order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialLayout {
    map_count: u32,
    slots: [i32; GraphicsLimits::MAX_MATERIAL_MAPS],
}

impl MaterialLayout {
    /// Layout for the map bits in `flags`
    pub fn from_flags(flags: MaterialFlags) -> Self {
        let mut slots = [-1; GraphicsLimits::MAX_MATERIAL_MAPS];
        let mut map_count = 0;
        for (slot, bit) in slots.iter_mut().zip(MaterialFlags::MAP_ORDER) {
            if flags.contains(bit) {
                *slot = map_count;
                map_count += 1;
            }
        }
        Self {
            map_count: map_count as u32,
            slots,
        }
    }

    /// Number of maps bound
    pub fn map_count(&self) -> u32 {
        self.map_count
    }

    /// Number of descriptor bindings, `1 + (map_count > 0)`
    pub fn binding_count(&self) -> u32 {
        1 + u32::from(self.map_count > 0)
    }

    /// Index into the sampler array per map in map order, -1 when absent
    pub fn slots(&self) -> [i32; GraphicsLimits::MAX_MATERIAL_MAPS] {
        self.slots
    }

    /// Specialization constants consumed by the material shaders
    ///
    /// Constant 0 is the map count, constants 1 to 6 the sampler slots.
    pub fn specialization(&self) -> [i32; GraphicsLimits::MAX_MATERIAL_MAPS + 1] {
        let mut constants = [0; GraphicsLimits::MAX_MATERIAL_MAPS + 1];
        constants[0] = self.map_count as i32;
        constants[1..].copy_from_slice(&self.slots);
        constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_maps_has_only_uniform_binding() {
        let layout = MaterialLayout::from_flags(MaterialFlags::TRANSLUCENT);
        assert_eq!(layout.map_count(), 0);
        assert_eq!(layout.binding_count(), 1);
        assert_eq!(layout.slots(), [-1; 6]);
    }

    #[test]
    fn test_binding_count_formula() {
        for bits in 0..64u32 {
            let flags = MaterialFlags::from_bits_truncate(bits << 8);
            let layout = MaterialLayout::from_flags(flags);
            assert_eq!(layout.map_count(), bits.count_ones());
            assert_eq!(layout.binding_count(), 1 + u32::from(bits != 0));
        }
    }

    #[test]
    fn test_slots_are_packed_in_map_order() {
        let layout = MaterialLayout::from_flags(MaterialFlags::NORMAL_MAP | MaterialFlags::AMBIENT_MAP);
        assert_eq!(layout.slots(), [-1, 0, -1, -1, -1, 1]);
        assert_eq!(layout.specialization(), [2, -1, 0, -1, -1, -1, 1]);
    }
}
