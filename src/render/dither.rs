//! # Binary Conversion for Thermal Output
//!
//! Thermal heads print black or nothing. This module turns a composed
//! grayscale job into packed 1-bit rows for the raster command.
//!
//! ## Algorithms
//!
//! | Method | Best For | Artifacts |
//! |--------|----------|-----------|
//! | Threshold | Text, QR codes | Hard edges, banding on photos |
//! | Bayer | Mixed text + photos | Regular cross-hatch pattern |
//! | Floyd-Steinberg | Photos | Noise, worms |
//!
//! QR symbols and glyphs are already black and white, so every algorithm keeps
//! them intact; the choice only matters for attached photos.
//!
//! ## Intensity Convention
//!
//! Intensity is `0.0` for white paper and `1.0` for a burned dot, the inverse
//! of 8-bit luma: `intensity = 1 - luma / 255`.
//!
//! ## Usage Example
//!
//! ```
//! use tegami::render::dither::{self, DitheringAlgorithm};
//! use image::{GrayImage, Luma};
//!
//! let img = GrayImage::from_pixel(16, 2, Luma([0u8]));
//! let rows = dither::to_raster(&img, DitheringAlgorithm::Threshold);
//! assert_eq!(rows, vec![0xFF; 4]);
//! ```

use image::GrayImage;

/// Bayer 8x8 dithering matrix
///
/// Values range from 0-63. Low values activate first at low intensities.
pub const BAYER8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Dithering algorithm used when converting a job to 1-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitheringAlgorithm {
    /// Fixed 50% cut. Crisp text, flat photos.
    Threshold,
    /// Ordered 8x8 Bayer matrix.
    Bayer,
    /// Error diffusion.
    #[default]
    FloydSteinberg,
}

impl DitheringAlgorithm {
    /// Parse a CLI/HTTP name (`threshold`, `bayer`, `floyd-steinberg`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "threshold" | "none" => Some(Self::Threshold),
            "bayer" => Some(Self::Bayer),
            "floyd-steinberg" | "floyd_steinberg" | "fs" => Some(Self::FloydSteinberg),
            _ => None,
        }
    }
}

/// Get the Bayer threshold for a pixel position.
///
/// Returns a value strictly inside (0, 1): `(BAYER8[y & 7][x & 7] + 0.5) / 64`.
/// Full black (1.0) always prints, full white (0.0) never does.
#[inline]
pub fn threshold(x: usize, y: usize) -> f32 {
    let matrix_value = BAYER8[y & 7][x & 7];
    (matrix_value as f32 + 0.5) / 64.0
}

/// Determine if a dot should be printed at the given position (Bayer).
#[inline]
pub fn should_print(x: usize, y: usize, intensity: f32) -> bool {
    intensity > threshold(x, y)
}

/// Pack a row of boolean pixel values into bytes.
///
/// ## Bit Packing
///
/// - Bit 7 (MSB) = leftmost pixel
/// - 1 = black (print dot), 0 = white (no dot)
/// - A trailing partial byte is padded with white
///
/// ```
/// use tegami::render::dither::pack_row;
///
/// let row = vec![true, true, true, true, false, false, false, false];
/// assert_eq!(pack_row(&row), vec![0xF0]);
/// ```
pub fn pack_row(pixels: &[bool]) -> Vec<u8> {
    let num_bytes = pixels.len().div_ceil(8);
    let mut bytes = vec![0u8; num_bytes];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            let byte_idx = i / 8;
            let bit_idx = 7 - (i % 8);
            bytes[byte_idx] |= 1 << bit_idx;
        }
    }

    bytes
}

#[inline]
fn intensity(luma: u8) -> f32 {
    1.0 - (luma as f32 / 255.0)
}

/// Convert a grayscale image into packed raster rows.
///
/// Output length is `ceil(width / 8) * height` bytes.
pub fn to_raster(img: &GrayImage, algorithm: DitheringAlgorithm) -> Vec<u8> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let width_bytes = width.div_ceil(8);
    let mut data = Vec::with_capacity(width_bytes * height);

    match algorithm {
        DitheringAlgorithm::Threshold | DitheringAlgorithm::Bayer => {
            let mut row = Vec::with_capacity(width);
            for y in 0..height {
                row.clear();
                for x in 0..width {
                    let v = intensity(img.get_pixel(x as u32, y as u32)[0]);
                    let on = if algorithm == DitheringAlgorithm::Bayer {
                        should_print(x, y, v)
                    } else {
                        v > 0.5
                    };
                    row.push(on);
                }
                data.extend(pack_row(&row));
            }
        }
        DitheringAlgorithm::FloydSteinberg => {
            let mut buffer: Vec<f32> = img.pixels().map(|p| intensity(p[0])).collect();
            let mut row = Vec::with_capacity(width);
            for y in 0..height {
                row.clear();
                for x in 0..width {
                    let idx = y * width + x;
                    let old = buffer[idx];
                    let on = old > 0.5;
                    let err = old - if on { 1.0 } else { 0.0 };
                    row.push(on);

                    if x + 1 < width {
                        buffer[idx + 1] += err * 7.0 / 16.0;
                    }
                    if y + 1 < height {
                        if x > 0 {
                            buffer[idx + width - 1] += err * 3.0 / 16.0;
                        }
                        buffer[idx + width] += err * 5.0 / 16.0;
                        if x + 1 < width {
                            buffer[idx + width + 1] += err * 1.0 / 16.0;
                        }
                    }
                }
                data.extend(pack_row(&row));
            }
        }
    }

    data
}

// ============================================================================
// TESTS
// ============================================================================
