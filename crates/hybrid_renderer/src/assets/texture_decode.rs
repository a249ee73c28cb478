//! Decoding helpers that produce texture descriptions

use image::ImageFormat;

use super::FormatError;
use crate::graphics::desc::{PixelFormat, TextureDesc};

impl TextureDesc {
    /// Decode a PNG into an sRGB texture with a full mip chain
    pub fn from_png(bytes: &[u8]) -> Result<Self, FormatError> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|e| FormatError::Image(format!("Failed to decode PNG: {e}")))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("Decoded PNG {}x{}", width, height);

        Ok(Self::new(width, height, PixelFormat::Rgba8Srgb)
            .with_pixels(rgba.into_raw())
            .with_full_mip_chain())
    }

    /// Single-color texture, handy as a default map
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = color.repeat((width * height) as usize);
        Self::new(width, height, PixelFormat::Rgba8).with_pixels(pixels)
    }

    /// Cube texture from six square faces of equal size (+X -X +Y -Y +Z -Z)
    pub fn cube_from_faces(size: u32, format: PixelFormat, faces: &[Vec<u8>; 6]) -> Result<Self, FormatError> {
        let face_bytes = format.image_bytes(size, size);
        if let Some(face) = faces.iter().position(|f| f.len() != face_bytes) {
            return Err(FormatError::Image(format!(
                "cube face {face} has {} bytes, expected {face_bytes}",
                faces[face].len()
            )));
        }
        Ok(Self::cube(size, format).with_pixels(faces.concat()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use std::io::Cursor;

    #[test]
    fn test_png_becomes_srgb_texture() {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_pixel(8, 4, Rgba([255, 0, 0, 255]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();

        let desc = TextureDesc::from_png(&png).unwrap();
        assert_eq!((desc.width, desc.height), (8, 4));
        assert_eq!(desc.format, PixelFormat::Rgba8Srgb);
        assert_eq!(desc.mip_levels, 4);
        assert_eq!(&desc.pixels[..4], &[255, 0, 0, 255]);
        desc.validate().unwrap();
    }

    #[test]
    fn test_garbage_is_an_image_error() {
        assert!(matches!(TextureDesc::from_png(b"not a png"), Err(FormatError::Image(_))));
    }

    #[test]
    fn test_cube_faces_are_checked() {
        let face = vec![0u8; 4 * 4 * 4];
        let faces: [Vec<u8>; 6] = std::array::from_fn(|_| face.clone());
        let cube = TextureDesc::cube_from_faces(4, PixelFormat::Rgba8, &faces).unwrap();
        cube.validate().unwrap();

        let mut short = faces;
        short[3].pop();
        assert!(TextureDesc::cube_from_faces(4, PixelFormat::Rgba8, &short).is_err());
    }
}
