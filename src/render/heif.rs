//! HEIC/HEIF attachment support.
//!
//! Phone cameras attach HEIC photos. The `image` crate cannot read them, so
//! with the `heif` feature enabled they go through libheif. Without the
//! feature, HEIC input is still recognised so the caller gets a clear error
//! instead of "unrecognized format".

use image::DynamicImage;

use crate::error::{Result, TegamiError};

/// Brands found in the `ftyp` box of HEIC/HEIF/AVIF containers.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"hevm", b"hevs", b"mif1", b"msf1",
    b"avif",
];

/// Sniff the ISO-BMFF `ftyp` box for a HEIF-family brand.
pub fn is_heic(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == brand.as_slice())
}

#[cfg(feature = "heif")]
pub fn decode_heic(bytes: &[u8]) -> Result<DynamicImage> {
    use image::RgbImage;
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(bytes)
        .map_err(|e| TegamiError::Image(format!("Failed to read HEIC: {}", e)))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| TegamiError::Image(format!("Failed to get primary image: {}", e)))?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| TegamiError::Image(format!("Failed to decode HEIC: {}", e)))?;

    let planes = decoded.planes();
    let interleaved = planes
        .interleaved
        .ok_or_else(|| TegamiError::Image("HEIC has no interleaved RGB plane".to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());
    let stride = interleaved.stride;
    let data = interleaved.data;

    let mut rgb = RgbImage::new(width, height);
    for y in 0..height {
        let row = y as usize * stride;
        for x in 0..width {
            let offset = row + x as usize * 3;
            if let Some(px) = data.get(offset..offset + 3) {
                rgb.put_pixel(x, y, image::Rgb([px[0], px[1], px[2]]));
            }
        }
    }

    Ok(DynamicImage::ImageRgb8(rgb))
}

#[cfg(not(feature = "heif"))]
pub fn decode_heic(_bytes: &[u8]) -> Result<DynamicImage> {
    Err(TegamiError::Image(
        "HEIC attachment received but tegami was built without the `heif` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_heic_brands() {
        let mut header = vec![0, 0, 0, 24];
        header.extend_from_slice(b"ftypheic");
        header.extend_from_slice(&[0; 8]);
        assert!(is_heic(&header));

        header[8..12].copy_from_slice(b"mif1");
        assert!(is_heic(&header));

        header[8..12].copy_from_slice(b"isom");
        assert!(!is_heic(&header));
    }

    #[test]
    fn test_is_heic_short_or_other_formats() {
        assert!(!is_heic(b"ftyp"));
        assert!(!is_heic(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"));
    }

    #[cfg(not(feature = "heif"))]
    #[test]
    fn test_decode_without_feature_is_image_error() {
        assert!(matches!(decode_heic(b"whatever"), Err(TegamiError::Image(_))));
    }
}
