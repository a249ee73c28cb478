//! Binary material format
//!
//! Little-endian: magic `MTRL`, base color `[f32; 4]`, roughness, metallic,
//! occlusion strength, translucent and double-sided as `u8` booleans, then
//! six 16-byte texture UUIDs in map order (albedo, normal, roughness,
//! metallic, emissive, ambient). The nil UUID marks a missing map.

use std::path::Path;

use uuid::Uuid;

use super::io::{Reader, Writer};
use super::FormatError;
use crate::graphics::desc::{MaterialDesc, MaterialMaps};
use crate::graphics::error::{RenderError, RenderResult};
use crate::graphics::handles::TextureHandle;
use crate::graphics::limits::GraphicsLimits;

/// File magic
pub const MATERIAL_MAGIC: [u8; 4] = *b"MTRL";

/// Decoded material record; textures are still asset ids
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialFile {
    /// Linear base color and alpha
    pub base_color: [f32; 4],
    /// Perceptual roughness
    pub roughness: f32,
    /// Metalness
    pub metallic: f32,
    /// Ambient map strength
    pub occlusion_strength: f32,
    /// Alpha blended
    pub translucent: bool,
    /// No back-face culling
    pub double_sided: bool,
    /// Texture ids in map order
    pub maps: [Option<Uuid>; GraphicsLimits::MAX_MATERIAL_MAPS],
}

impl Default for MaterialFile {
    fn default() -> Self {
        let desc = MaterialDesc::default();
        Self {
            base_color: desc.base_color,
            roughness: desc.roughness,
            metallic: desc.metallic,
            occlusion_strength: desc.occlusion_strength,
            translucent: desc.translucent,
            double_sided: desc.double_sided,
            maps: [None; GraphicsLimits::MAX_MATERIAL_MAPS],
        }
    }
}

impl MaterialFile {
    /// Serialize
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::default();
        w.bytes(&MATERIAL_MAGIC);
        w.f32s(&self.base_color);
        w.f32(self.roughness);
        w.f32(self.metallic);
        w.f32(self.occlusion_strength);
        w.u8(u8::from(self.translucent));
        w.u8(u8::from(self.double_sided));
        for map in &self.maps {
            w.bytes(map.unwrap_or_else(Uuid::nil).as_bytes());
        }
        w.into_bytes()
    }

    /// Deserialize
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut r = Reader::new(bytes);
        r.magic(MATERIAL_MAGIC)?;
        let base_color = r.f32s("base color")?;
        let roughness = r.f32("roughness")?;
        let metallic = r.f32("metallic")?;
        let occlusion_strength = r.f32("occlusion strength")?;
        let translucent = r.u8("translucent")? != 0;
        let double_sided = r.u8("double sided")? != 0;

        let mut maps = [None; GraphicsLimits::MAX_MATERIAL_MAPS];
        for map in &mut maps {
            let id = Uuid::from_bytes(r.array("texture id")?);
            *map = (!id.is_nil()).then_some(id);
        }
        r.finish()?;

        Ok(Self {
            base_color,
            roughness,
            metallic,
            occlusion_strength,
            translucent,
            double_sided,
            maps,
        })
    }

    /// Read and decode a material file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let path = path.as_ref();
        log::debug!("Loading material from: {:?}", path);
        Self::decode(&std::fs::read(path)?)
    }

    /// Encode and write a material file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FormatError> {
        std::fs::write(path, self.encode())?;
        Ok(())
    }

    /// Material description with texture ids resolved to loaded textures
    pub fn to_desc(&self, mut resolve: impl FnMut(&Uuid) -> Option<TextureHandle>) -> RenderResult<MaterialDesc> {
        let mut handles = [None; GraphicsLimits::MAX_MATERIAL_MAPS];
        for (handle, id) in handles.iter_mut().zip(&self.maps) {
            if let Some(id) = id {
                let resolved = resolve(id)
                    .ok_or_else(|| RenderError::InvalidMaterial(format!("texture {id} is not loaded")))?;
                *handle = Some(resolved);
            }
        }
        let [albedo, normal, roughness, metallic, emissive, ambient] = handles;

        Ok(MaterialDesc {
            base_color: self.base_color,
            roughness: self.roughness,
            metallic: self.metallic,
            occlusion_strength: self.occlusion_strength,
            translucent: self.translucent,
            double_sided: self.double_sided,
            wireframe: false,
            maps: MaterialMaps {
                albedo,
                normal,
                roughness,
                metallic,
                emissive,
                ambient,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::desc::MaterialFlags;

    fn sample() -> MaterialFile {
        MaterialFile {
            base_color: [0.8, 0.2, 0.1, 0.5],
            roughness: 0.3,
            metallic: 1.0,
            occlusion_strength: 0.7,
            translucent: true,
            double_sided: false,
            maps: [
                Some(Uuid::from_u128(0x1234)),
                None,
                None,
                Some(Uuid::from_u128(0xabcd_ef01)),
                None,
                None,
            ],
        }
    }

    #[test]
    fn test_scalars_and_map_presence_survive() {
        let file = sample();
        let bytes = file.encode();
        assert_eq!(&bytes[..4], b"MTRL");
        assert_eq!(bytes.len(), 4 + 16 + 12 + 2 + 6 * 16);
        assert_eq!(MaterialFile::decode(&bytes).unwrap(), file);
    }

    #[test]
    fn test_nil_uuid_means_no_texture() {
        let bytes = MaterialFile::default().encode();
        let decoded = MaterialFile::decode(&bytes).unwrap();
        assert!(decoded.maps.iter().all(Option::is_none));
        assert!(decoded.to_desc(|_| None).unwrap().flags().maps().is_empty());
    }

    #[test]
    fn test_to_desc_resolves_maps() {
        let mut slots: slotmap::SlotMap<TextureHandle, ()> = slotmap::SlotMap::with_key();
        let albedo = slots.insert(());
        let metallic = slots.insert(());
        let desc = sample()
            .to_desc(|id| match id.as_u128() {
                0x1234 => Some(albedo),
                0xabcd_ef01 => Some(metallic),
                _ => None,
            })
            .unwrap();
        assert_eq!(desc.maps.albedo, Some(albedo));
        assert_eq!(desc.maps.metallic, Some(metallic));
        assert!(desc.flags().contains(MaterialFlags::TRANSLUCENT | MaterialFlags::ALBEDO_MAP));
        assert!(matches!(sample().to_desc(|_| None), Err(RenderError::InvalidMaterial(_))));
    }

    #[test]
    fn test_rejects_other_magic_and_short_input() {
        let mut bytes = sample().encode();
        assert!(MaterialFile::decode(&bytes[..40]).is_err());
        bytes[..4].copy_from_slice(b"MESH");
        assert!(matches!(MaterialFile::decode(&bytes), Err(FormatError::BadMagic { .. })));
    }
}
