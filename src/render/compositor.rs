//! # Bitmap Compositor
//!
//! Converts the pieces of a print job into grayscale bitmaps and stacks them
//! into one image exactly as wide as the paper.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────── target_width ────────────────┐
//! │ header (text bitmap, 10px margins)           │
//! ├──────────────────────────────────────────────┤ ← padding
//! │ body text                                    │
//! ├──────────────────────────────────────────────┤
//! │ attachment (downscaled if wider than paper)  │
//! ├──────────────────────────────────────────────┤
//! │ ┌────────┐                                   │
//! │ │ QR ▓▓▓ │  narrower bitmaps are never       │
//! │ └────────┘  upscaled, only left-aligned      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Every operation is a pure transform; no bitmap state survives a call.
//! Bitmaps are 8-bit grayscale on a white (255) background.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, imageops, imageops::FilterType};
use tracing::debug;

use super::font::PrintFont;
use crate::error::{Result, TegamiError};

/// Left/top/bottom margin around rendered text, in pixels.
pub const TEXT_MARGIN: u32 = 10;

/// Default vertical gap between stacked bitmaps, in pixels.
pub const DEFAULT_PADDING: u32 = 1;

/// Render text into a bitmap.
///
/// The text is split on line breaks. Every line is at least
/// [`PrintFont::min_line_height`] tall, so blank lines still advance the
/// cursor. The bitmap is `max(target_width, widest line + 2 * margin)` wide
/// and `sum(line heights) + 2 * margin` tall; lines are drawn left-aligned at
/// the margin.
///
/// An empty string renders as a single blank line.
///
/// ## Example
///
/// ```
/// use tegami::render::{compositor, font::PrintFont};
///
/// let font = PrintFont::builtin(24.0);
/// let img = compositor::text_to_bitmap("", &font, 576);
/// assert_eq!(img.width(), 576);
/// assert_eq!(img.height(), font.min_line_height() + 20);
/// ```
pub fn text_to_bitmap(text: &str, font: &PrintFont, target_width: u32) -> GrayImage {
    let mut lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        lines.push("");
    }

    let mut max_line_width = 0u32;
    let mut line_heights = Vec::with_capacity(lines.len());
    for line in &lines {
        if !line.trim().is_empty() {
            max_line_width = max_line_width.max(font.measure(line).width);
        }
        line_heights.push(font.line_height(line));
    }

    let total_height: u32 = line_heights.iter().sum();
    let width = target_width.max(max_line_width + TEXT_MARGIN * 2);
    let height = total_height + TEXT_MARGIN * 2;

    let mut img = GrayImage::from_pixel(width, height, Luma([255u8]));
    let mut y_offset = TEXT_MARGIN;
    for (line, line_height) in lines.iter().zip(&line_heights) {
        if !line.trim().is_empty() {
            font.draw(&mut img, TEXT_MARGIN as i32, y_offset as i32, line);
        }
        y_offset += line_height;
    }

    img
}

/// Decode encoded image bytes into a grayscale bitmap.
///
/// The format is sniffed from the bytes, never taken from a file name or a
/// MIME type. Transparent areas are flattened onto white paper.
pub fn image_from_bytes(bytes: &[u8]) -> Result<GrayImage> {
    if super::heif::is_heic(bytes) {
        let img = super::heif::decode_heic(bytes)?;
        return Ok(flatten_onto_white(&img));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| TegamiError::Image(format!("Unrecognized image format: {}", e)))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| TegamiError::Image(format!("Failed to decode {:?} image: {}", format, e)))?;
    debug!(?format, width = img.width(), height = img.height(), "decoded image");

    Ok(flatten_onto_white(&img))
}

/// Rotate tall, narrow images a quarter turn so they use the paper width.
///
/// Applies only when the image is narrower than the paper, taller than the
/// paper, and more than 1.5 times as tall as it is wide. Rotation is
/// counter-clockwise.
pub fn auto_rotate(img: GrayImage, paper_width: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width < paper_width && height > paper_width && height as f32 / width.max(1) as f32 > 1.5 {
        debug!(width, height, "rotating portrait image to landscape");
        imageops::rotate270(&img)
    } else {
        img
    }
}

/// Stack bitmaps top to bottom into one canvas `target_width` wide.
///
/// - Bitmaps wider than `target_width` are downscaled to exactly that width,
///   keeping the aspect ratio (height rounded down, at least 1px).
/// - Narrower bitmaps are never upscaled; they are pasted left-aligned.
/// - `padding` pixels of white separate consecutive bitmaps (none after the
///   last one).
///
/// Returns `None` for an empty list.
pub fn stack_vertically(bitmaps: &[GrayImage], target_width: u32, padding: u32) -> Option<GrayImage> {
    if bitmaps.is_empty() {
        return None;
    }

    let fitted: Vec<std::borrow::Cow<'_, GrayImage>> = bitmaps
        .iter()
        .map(|img| {
            if img.width() > target_width {
                let new_height = scaled_height(img.width(), img.height(), target_width);
                debug!(
                    from = ?img.dimensions(),
                    to = ?(target_width, new_height),
                    "downscaling bitmap to paper width"
                );
                std::borrow::Cow::Owned(imageops::resize(
                    img,
                    target_width,
                    new_height,
                    FilterType::Lanczos3,
                ))
            } else {
                std::borrow::Cow::Borrowed(img)
            }
        })
        .collect();

    let gaps = (fitted.len() as u32 - 1) * padding;
    let total_height = fitted.iter().map(|img| img.height()).sum::<u32>() + gaps;

    let mut canvas = GrayImage::from_pixel(target_width, total_height, Luma([255u8]));
    let mut y = 0u32;
    for img in &fitted {
        imageops::replace(&mut canvas, img.as_ref(), 0, y as i64);
        y += img.height() + padding;
    }

    Some(canvas)
}

/// Encode a bitmap as PNG.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| TegamiError::Image(format!("Failed to encode PNG: {}", e)))?;
    Ok(buffer.into_inner())
}

fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    ((height as u64 * target_width as u64) / width.max(1) as u64).max(1) as u32
}

fn flatten_onto_white(img: &DynamicImage) -> GrayImage {
    if !img.color().has_alpha() {
        return img.to_luma8();
    }

    let rgba = img.to_rgba8();
    let mut out = GrayImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let luma = (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000;
        let alpha = a as u32;
        let value = (luma * alpha + 255 * (255 - alpha)) / 255;
        out.put_pixel(x, y, Luma([value as u8]));
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    #[test]
    fn test_empty_text_is_one_blank_line() {
        let font = PrintFont::builtin(24.0);
        let img = text_to_bitmap("", &font, 576);
        assert_eq!(img.width(), 576);
        assert_eq!(img.height(), font.min_line_height() + 2 * TEXT_MARGIN);
        assert!(img.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_blank_lines_reserve_height() {
        let font = PrintFont::builtin(24.0);
        let one = text_to_bitmap("a", &font, 100);
        let three = text_to_bitmap("a\n\nb", &font, 100);
        assert_eq!(three.height() - 2 * TEXT_MARGIN, 3 * (one.height() - 2 * TEXT_MARGIN));
    }

    #[test]
    fn test_wide_line_widens_bitmap() {
        let font = PrintFont::builtin(24.0);
        let line = "x".repeat(60); // 60 * 12 = 720px
        let img = text_to_bitmap(&line, &font, 576);
        assert_eq!(img.width(), 720 + 2 * TEXT_MARGIN);
    }

    #[test]
    fn test_text_is_drawn_inside_margins() {
        let font = PrintFont::builtin(24.0);
        let img = text_to_bitmap("HELLO", &font, 200);
        for (x, y, p) in img.enumerate_pixels() {
            if x < TEXT_MARGIN || y < TEXT_MARGIN {
                assert_eq!(p[0], 255, "ink in margin at ({}, {})", x, y);
            }
        }
        assert!(img.pixels().any(|p| p[0] == 0));
    }

    #[test]
    fn test_image_from_bytes_png() {
        let png = encode_png(&solid(30, 20, 0)).unwrap();
        let img = image_from_bytes(&png).unwrap();
        assert_eq!(img.dimensions(), (30, 20));
        assert!(img.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_image_from_bytes_rejects_garbage() {
        let result = image_from_bytes(b"definitely not an image");
        assert!(matches!(result, Err(TegamiError::Image(_))));
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let rgba = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        let mut buffer = Cursor::new(Vec::new());
        rgba.write_to(&mut buffer, ImageFormat::Png).unwrap();
        let img = image_from_bytes(&buffer.into_inner()).unwrap();
        assert!(img.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_stack_empty_is_none() {
        assert!(stack_vertically(&[], 576, 1).is_none());
    }

    #[test]
    fn test_stack_single_keeps_dimensions() {
        let img = stack_vertically(&[solid(576, 123, 0)], 576, 5).unwrap();
        assert_eq!(img.dimensions(), (576, 123));
    }

    #[test]
    fn test_stack_downscales_wide_bitmaps() {
        let img = stack_vertically(&[solid(1152, 400, 0)], 576, 0).unwrap();
        assert_eq!(img.width(), 576);
        assert!((img.height() as i32 - 200).abs() <= 1);
    }

    #[test]
    fn test_stack_never_upscales_and_left_aligns() {
        let img = stack_vertically(&[solid(100, 50, 0), solid(576, 10, 255)], 576, 2).unwrap();
        assert_eq!(img.dimensions(), (576, 62));
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(99, 49)[0], 0);
        assert_eq!(img.get_pixel(100, 0)[0], 255);
        // padding row between the two bitmaps stays white
        assert_eq!(img.get_pixel(0, 50)[0], 255);
        assert_eq!(img.get_pixel(0, 51)[0], 255);
    }

    #[test]
    fn test_stack_padding_between_items_only() {
        let items = vec![solid(10, 10, 0), solid(10, 10, 0), solid(10, 10, 0)];
        let img = stack_vertically(&items, 10, 3).unwrap();
        assert_eq!(img.height(), 36);
    }

    #[test]
    fn test_auto_rotate_tall_receipt() {
        let tall = solid(200, 900, 0);
        assert_eq!(auto_rotate(tall, 576).dimensions(), (900, 200));

        let square = solid(300, 300, 0);
        assert_eq!(auto_rotate(square, 576).dimensions(), (300, 300));

        let wide_enough = solid(600, 1200, 0);
        assert_eq!(auto_rotate(wide_enough, 576).dimensions(), (600, 1200));
    }
}
