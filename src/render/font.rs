//! Font loading, metrics and glyph drawing shared by every text bitmap.
//!
//! A [`PrintFont`] is either an outline font (TrueType/OpenType, including
//! `.ttc` collections) rasterised with ab_glyph, or the built-in Spleen bitmap
//! font. Loading never fails from the caller's point of view: an unreadable
//! font file logs a warning and yields the built-in face, so a misconfigured
//! font path degrades print quality instead of stopping the printer.
//!
//! Fonts are loaded once at startup and shared by reference; nothing here
//! touches the filesystem after [`PrintFont::load`] returns.

use std::fmt;
use std::path::Path;

use ab_glyph::{Font, FontArc, FontVec, PxScale, ScaleFont, point};
use image::{GrayImage, Luma};
use spleen_font::{FONT_6X12, FONT_12X24, PSF2Font};
use tracing::{debug, warn};

use crate::error::{Result, TegamiError};

/// Extra vertical space between lines, as a fraction of the font size.
const LINE_SPACING_RATIO: f32 = 0.2;

/// Measured size of one line of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextExtent {
    /// Horizontal extent in pixels (advance or ink, whichever is wider).
    pub width: u32,
    /// Ink height in pixels; 0 for text with no visible glyphs.
    pub height: u32,
}

#[derive(Clone)]
enum Face {
    Outline { font: FontArc, scale: PxScale },
    Bitmap(BitmapFace),
}

/// Spleen bitmap face, integer-scaled to approximate the requested size.
#[derive(Debug, Clone, Copy)]
struct BitmapFace {
    data: &'static [u8],
    char_width: u32,
    char_height: u32,
    scale: u32,
}

impl BitmapFace {
    fn for_size(size: f32) -> Self {
        let (data, char_width, char_height) = if size >= 18.0 {
            (FONT_12X24, 12, 24)
        } else {
            (FONT_6X12, 6, 12)
        };
        let scale = ((size / char_height as f32).round() as u32).max(1);
        Self {
            data,
            char_width,
            char_height,
            scale,
        }
    }

    fn advance(&self) -> u32 {
        self.char_width * self.scale
    }

    fn height(&self) -> u32 {
        self.char_height * self.scale
    }
}

/// A font at a fixed pixel size.
#[derive(Clone)]
pub struct PrintFont {
    face: Face,
    size: f32,
}

impl fmt::Debug for PrintFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.face {
            Face::Outline { .. } => "outline",
            Face::Bitmap(_) => "builtin",
        };
        f.debug_struct("PrintFont")
            .field("face", &kind)
            .field("size", &self.size)
            .finish()
    }
}

impl PrintFont {
    /// Load a font file, falling back to the built-in face.
    ///
    /// `None` selects the built-in face directly (with a warning, since CJK
    /// text needs a real font to print legibly).
    pub fn load(path: Option<&Path>, size: f32) -> Self {
        match path {
            Some(path) => match Self::try_load(path, size) {
                Ok(font) => {
                    debug!(path = %path.display(), size, "loaded font");
                    font
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "font unavailable, using built-in font");
                    Self::builtin(size)
                }
            },
            None => {
                warn!("no font path configured, using built-in font");
                Self::builtin(size)
            }
        }
    }

    /// Load a font file without fallback.
    pub fn try_load(path: &Path, size: f32) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| TegamiError::Font(format!("Failed to read {}: {}", path.display(), e)))?;
        let font = FontVec::try_from_vec_and_index(bytes, 0)
            .map_err(|e| TegamiError::Font(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(Self::from_font(FontArc::new(font), size))
    }

    /// Wrap an already-parsed outline font.
    ///
    /// `size` is the em size in pixels, matching the point-size convention of
    /// desktop text APIs rather than ab_glyph's ascent-to-descent height.
    pub fn from_font(font: FontArc, size: f32) -> Self {
        let scale = match font.units_per_em() {
            Some(upem) if upem > 0.0 => PxScale::from(size * font.height_unscaled() / upem),
            _ => PxScale::from(size),
        };
        Self {
            face: Face::Outline { font, scale },
            size,
        }
    }

    /// The built-in Spleen bitmap font.
    pub fn builtin(size: f32) -> Self {
        Self {
            face: Face::Bitmap(BitmapFace::for_size(size)),
            size,
        }
    }

    /// Whether this is the built-in fallback face.
    pub fn is_builtin(&self) -> bool {
        matches!(self.face, Face::Bitmap(_))
    }

    /// Nominal font size in pixels.
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Distance from the top of a line to the baseline.
    pub fn ascent(&self) -> f32 {
        match &self.face {
            Face::Outline { font, scale } => font.as_scaled(*scale).ascent(),
            Face::Bitmap(b) => b.height() as f32,
        }
    }

    /// Distance from the baseline down to the lowest descender (≤ 0).
    pub fn descent(&self) -> f32 {
        match &self.face {
            Face::Outline { font, scale } => font.as_scaled(*scale).descent(),
            Face::Bitmap(_) => 0.0,
        }
    }

    /// Ascent plus descender depth.
    pub fn base_line_height(&self) -> u32 {
        (self.ascent() + self.descent().abs()).ceil() as u32
    }

    /// Extra space added below every line.
    pub fn line_spacing(&self) -> u32 {
        (self.size * LINE_SPACING_RATIO).floor() as u32
    }

    /// Height reserved for a blank line; also the floor for any line.
    pub fn min_line_height(&self) -> u32 {
        self.base_line_height() + self.line_spacing()
    }

    /// Height a line of `text` occupies when stacked with others.
    pub fn line_height(&self, text: &str) -> u32 {
        if text.trim().is_empty() {
            return self.min_line_height();
        }
        self.measure(text).height.max(self.base_line_height()) + self.line_spacing()
    }

    /// Measure a single line of text.
    pub fn measure(&self, text: &str) -> TextExtent {
        match &self.face {
            Face::Outline { font, scale } => {
                let scaled = font.as_scaled(*scale);
                let ascent = scaled.ascent();
                let mut caret = 0.0f32;
                let mut prev = None;
                let mut right = 0.0f32;
                let mut top = f32::MAX;
                let mut bottom = f32::MIN;

                for ch in text.chars() {
                    let id = font.glyph_id(ch);
                    if let Some(prev) = prev {
                        caret += scaled.kern(prev, id);
                    }
                    let glyph = id.with_scale_and_position(*scale, point(caret, ascent));
                    if let Some(outlined) = font.outline_glyph(glyph) {
                        let bounds = outlined.px_bounds();
                        right = right.max(bounds.max.x);
                        top = top.min(bounds.min.y);
                        bottom = bottom.max(bounds.max.y);
                    }
                    caret += scaled.h_advance(id);
                    prev = Some(id);
                }

                let height = if bottom > top { (bottom - top).ceil() as u32 } else { 0 };
                TextExtent {
                    width: caret.max(right).ceil() as u32,
                    height,
                }
            }
            Face::Bitmap(b) => {
                let count = text.chars().count() as u32;
                let visible = text.chars().any(|c| !c.is_whitespace());
                TextExtent {
                    width: count * b.advance(),
                    height: if visible { b.height() } else { 0 },
                }
            }
        }
    }

    /// Draw one line of black text with its top-left corner at `(x, y)`.
    ///
    /// Anti-aliased coverage darkens pixels; it never lightens what is
    /// already on the canvas. Pixels outside the canvas are clipped.
    pub fn draw(&self, canvas: &mut GrayImage, x: i32, y: i32, text: &str) {
        match &self.face {
            Face::Outline { font, scale } => {
                let scaled = font.as_scaled(*scale);
                let baseline = y as f32 + scaled.ascent();
                let mut caret = x as f32;
                let mut prev = None;

                for ch in text.chars() {
                    let id = font.glyph_id(ch);
                    if let Some(prev) = prev {
                        caret += scaled.kern(prev, id);
                    }
                    let glyph = id.with_scale_and_position(*scale, point(caret, baseline));
                    if let Some(outlined) = font.outline_glyph(glyph) {
                        let bounds = outlined.px_bounds();
                        outlined.draw(|px, py, coverage| {
                            let gx = px as i32 + bounds.min.x as i32;
                            let gy = py as i32 + bounds.min.y as i32;
                            darken(canvas, gx, gy, coverage);
                        });
                    }
                    caret += scaled.h_advance(id);
                    prev = Some(id);
                }
            }
            Face::Bitmap(b) => draw_bitmap_text(canvas, b, x, y, text),
        }
    }
}

fn darken(canvas: &mut GrayImage, x: i32, y: i32, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i32 || y >= canvas.height() as i32 {
        return;
    }
    let value = (255.0 * (1.0 - coverage.clamp(0.0, 1.0))).round() as u8;
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    if value < pixel[0] {
        *pixel = Luma([value]);
    }
}

fn draw_bitmap_text(canvas: &mut GrayImage, face: &BitmapFace, x: i32, y: i32, text: &str) {
    let Ok(mut spleen) = PSF2Font::new(face.data) else {
        return;
    };
    let scale = face.scale as i32;
    let mut cursor_x = x;

    for ch in text.chars() {
        if !ch.is_whitespace() {
            let utf8 = ch.to_string();
            match spleen.glyph_for_utf8(utf8.as_bytes()) {
                Some(glyph) => {
                    for (row_y, row) in glyph.enumerate() {
                        for (col_x, on) in row.enumerate() {
                            if on {
                                fill_block(
                                    canvas,
                                    cursor_x + col_x as i32 * scale,
                                    y + row_y as i32 * scale,
                                    scale,
                                );
                            }
                        }
                    }
                }
                None => draw_box(canvas, cursor_x, y, face.advance() as i32, face.height() as i32),
            }
        }
        cursor_x += face.advance() as i32;
    }
}

fn fill_block(canvas: &mut GrayImage, x: i32, y: i32, size: i32) {
    for dy in 0..size {
        for dx in 0..size {
            darken(canvas, x + dx, y + dy, 1.0);
        }
    }
}

/// Outline box for characters the bitmap font has no glyph for.
fn draw_box(canvas: &mut GrayImage, x: i32, y: i32, width: i32, height: i32) {
    let (left, right) = (x + 1, x + width - 2);
    let (top, bottom) = (y + 2, y + height - 2);
    for gx in left..=right {
        darken(canvas, gx, top, 1.0);
        darken(canvas, gx, bottom, 1.0);
    }
    for gy in top..=bottom {
        darken(canvas, left, gy, 1.0);
        darken(canvas, right, gy, 1.0);
    }
}

// ============================================================================
// TESTS
// ============================================================================
