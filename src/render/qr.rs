//! # QR Composer
//!
//! Renders a QR symbol with a centered caption underneath, as one bitmap.
//! Footer links in a job are printed this way: the symbol for scanning, the
//! page title for the human holding the receipt.
//!
//! ## Layout
//!
//! ```text
//! ┌───────────── max(symbol, caption block) ─────────────┐
//! │                    ┌──────────┐                      │
//! │                    │ ▓▓ ▓ ▓▓▓ │  symbol, centered    │
//! │                    │ ▓ ▓▓▓ ▓▓ │                      │
//! │                    └──────────┘                      │
//! │                                  20px gap            │
//! │ ┌──────────────── caption block ───────────────────┐ │
//! │ │ 10px        Example Domain - a page             │ │
//! │ │             title wrapped per char               │ │
//! │ │ 10px                                             │ │
//! │ └──────────────────────────────────────────────────┘ │
//! │                                  10px bottom margin  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Captions wrap per character rather than per word so that CJK titles,
//! which have no spaces, still fit the paper.

use image::{GrayImage, Luma, imageops, imageops::FilterType};
use qrcode::{EcLevel, QrCode};
use tracing::debug;

use super::font::PrintFont;
use crate::error::{Result, TegamiError};

/// Gap between the symbol and the caption block.
const CAPTION_GAP: u32 = 20;

/// White space below the caption block.
const BOTTOM_MARGIN: u32 = 10;

/// Caption margin (each side, and top/bottom inside the caption block).
const CAPTION_MARGIN: u32 = 10;

/// Error correction levels tried in order, most robust first.
const EC_LEVELS: [EcLevel; 4] = [EcLevel::H, EcLevel::Q, EcLevel::M, EcLevel::L];

/// Options for a single QR + caption bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrOptions {
    /// Pixels per QR module
    pub box_size: u32,
    /// Quiet zone, in modules
    pub border: u32,
    /// Rescale the symbol to this width (aspect ratio preserved)
    pub qr_width: Option<u32>,
    /// Caption block width; defaults to `max(symbol width, paper width)`
    pub caption_width: Option<u32>,
}

impl QrOptions {
    /// Compact symbols used for footer links.
    pub const FOOTER: Self = Self {
        box_size: 4,
        border: 2,
        qr_width: None,
        caption_width: None,
    };
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            box_size: 10,
            border: 4,
            qr_width: None,
            caption_width: None,
        }
    }
}

/// Composes QR symbols with captions for a fixed paper width.
#[derive(Debug, Clone, Copy)]
pub struct QrComposer<'a> {
    font: &'a PrintFont,
    paper_width: u32,
}

impl<'a> QrComposer<'a> {
    pub fn new(font: &'a PrintFont, paper_width: u32) -> Self {
        Self { font, paper_width }
    }

    /// Render `data` as a QR symbol with `caption` centered below it.
    ///
    /// Fails only when the payload does not fit a QR symbol at any error
    /// correction level.
    pub fn render(&self, data: &str, caption: &str, opts: &QrOptions) -> Result<GrayImage> {
        let mut symbol = render_symbol(data, opts.box_size, opts.border)?;

        if let Some(qr_width) = opts.qr_width
            && qr_width > 0
            && symbol.width() != qr_width
        {
            let height = ((symbol.height() as u64 * qr_width as u64) / symbol.width() as u64).max(1);
            debug!(from = symbol.width(), to = qr_width, "resizing QR symbol");
            symbol = imageops::resize(&symbol, qr_width, height as u32, FilterType::Lanczos3);
        }

        let caption_width = opts
            .caption_width
            .unwrap_or_else(|| symbol.width().max(self.paper_width));
        let caption_img = self.render_caption(caption, caption_width);

        let width = symbol.width().max(caption_img.width());
        let height = symbol.height() + CAPTION_GAP + caption_img.height() + BOTTOM_MARGIN;
        let mut out = GrayImage::from_pixel(width, height, Luma([255u8]));

        let symbol_x = (width - symbol.width()) / 2;
        imageops::replace(&mut out, &symbol, symbol_x as i64, 0);

        let caption_x = (width - caption_img.width()) / 2;
        let caption_y = symbol.height() + CAPTION_GAP;
        imageops::replace(&mut out, &caption_img, caption_x as i64, caption_y as i64);

        debug!(data, width, height, "composed QR bitmap");
        Ok(out)
    }

    /// Wrap a caption per character so no line exceeds `block_width - 20`.
    pub fn wrap_caption(&self, caption: &str, block_width: u32) -> Vec<String> {
        let limit = block_width.saturating_sub(2 * CAPTION_MARGIN);
        let mut lines = Vec::new();

        for line in caption.lines() {
            if line.trim().is_empty() {
                lines.push(String::new());
                continue;
            }

            let mut current = String::new();
            for ch in line.chars() {
                current.push(ch);
                if self.font.measure(&current).width > limit {
                    current.pop();
                    if !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                    }
                    current.push(ch);
                }
            }
            if !current.is_empty() {
                lines.push(current);
            }
        }

        lines
    }

    fn render_caption(&self, caption: &str, block_width: u32) -> GrayImage {
        let lines = self.wrap_caption(caption, block_width);
        let heights: Vec<u32> = lines.iter().map(|l| self.font.line_height(l)).collect();
        let height = heights.iter().sum::<u32>() + 2 * CAPTION_MARGIN;

        let mut img = GrayImage::from_pixel(block_width, height, Luma([255u8]));
        let mut y = CAPTION_MARGIN;
        for (line, line_height) in lines.iter().zip(&heights) {
            if !line.trim().is_empty() {
                let line_width = self.font.measure(line).width;
                let x = (block_width.saturating_sub(line_width) / 2).max(CAPTION_MARGIN);
                self.font.draw(&mut img, x as i32, y as i32, line);
            }
            y += line_height;
        }
        img
    }
}

/// Encode `data` and draw the bare symbol, `box_size` px per module.
fn render_symbol(data: &str, box_size: u32, border: u32) -> Result<GrayImage> {
    let mut last_err = None;
    let code = EC_LEVELS.iter().find_map(|&level| {
        match QrCode::with_error_correction_level(data, level) {
            Ok(code) => {
                if level != EcLevel::H {
                    debug!(?level, "payload too long for level H, using lower level");
                }
                Some(code)
            }
            Err(e) => {
                last_err = Some(e);
                None
            }
        }
    });
    let code = code.ok_or_else(|| {
        TegamiError::Qr(match last_err {
            Some(e) => format!("QR code generation failed: {}", e),
            None => "QR code generation failed".to_string(),
        })
    })?;

    let box_size = box_size.max(1);
    let modules = code.width() as u32;
    let size = (modules + 2 * border) * box_size;
    let mut img = GrayImage::from_pixel(size, size, Luma([255u8]));

    for qy in 0..modules {
        for qx in 0..modules {
            if code[(qx as usize, qy as usize)] != qrcode::Color::Dark {
                continue;
            }
            let px = (qx + border) * box_size;
            let py = (qy + border) * box_size;
            for cy in 0..box_size {
                for cx in 0..box_size {
                    img.put_pixel(px + cx, py + cy, Luma([0u8]));
                }
            }
        }
    }

    Ok(img)
}

// ============================================================================
// TESTS
// ============================================================================
