//! # Render Configuration
//!
//! Long-lived settings shared by the job builder, the receiver and the
//! preview server. Built once at startup; fonts are loaded here and never
//! again.
//!
//! | Setting | Default | Used by |
//! |---------|---------|---------|
//! | `printer` | mC-Print3, 576 dots | every bitmap width |
//! | `body_font` | 30px | header/body/footer text on the receiver |
//! | `caption_font` | 20px | QR captions in the builder |
//! | `summary` | 30 / 900 / 15 | message summarizer |
//! | `footer_qr` | box 4, border 2 | footer link symbols |
//! | `padding` | 1px | gap between stacked parts |

use std::collections::HashSet;
use std::path::Path;

use crate::error::{Result, TegamiError};
use crate::printer::PrinterConfig;
use crate::render::compositor::DEFAULT_PADDING;
use crate::render::dither::DitheringAlgorithm;
use crate::render::font::PrintFont;
use crate::render::qr::QrOptions;
use crate::text::SummaryOptions;

/// Font size for job text on the receiver.
pub const BODY_FONT_SIZE: f32 = 30.0;

/// Font size for QR captions.
pub const CAPTION_FONT_SIZE: f32 = 20.0;

/// Default port of the job receiver.
pub const DEFAULT_RECEIVER_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub printer: PrinterConfig,
    pub body_font: PrintFont,
    pub caption_font: PrintFont,
    pub summary: SummaryOptions,
    pub footer_qr: QrOptions,
    pub padding: u32,
    pub dithering: DitheringAlgorithm,
    /// Rotate tall narrow attachments to use the paper width
    pub auto_rotate: bool,
}

impl RenderConfig {
    /// Load fonts from `font_path` (or fall back to the built-in font).
    pub fn new(printer: PrinterConfig, font_path: Option<&Path>) -> Self {
        Self {
            body_font: PrintFont::load(font_path, BODY_FONT_SIZE),
            caption_font: PrintFont::load(font_path, CAPTION_FONT_SIZE),
            ..Self::builtin(printer)
        }
    }

    /// Configuration using only the built-in font. Never touches the disk.
    pub fn builtin(printer: PrinterConfig) -> Self {
        Self {
            printer,
            body_font: PrintFont::builtin(BODY_FONT_SIZE),
            caption_font: PrintFont::builtin(CAPTION_FONT_SIZE),
            summary: SummaryOptions::default(),
            footer_qr: QrOptions::FOOTER,
            padding: DEFAULT_PADDING,
            dithering: DitheringAlgorithm::default(),
            auto_rotate: false,
        }
    }

    /// Paper width in pixels; every composed job is exactly this wide.
    pub fn paper_width(&self) -> u32 {
        self.printer.width_dots as u32
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::builtin(PrinterConfig::default())
    }
}

/// Parse a comma-separated list of chat user ids.
///
/// An empty list is a configuration error: without target users no guild
/// message would ever print.
pub fn parse_user_ids(s: &str) -> Result<HashSet<u64>> {
    let ids = s
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| TegamiError::Config(format!("Invalid user id: {}", part)))
        })
        .collect::<Result<HashSet<u64>>>()?;

    if ids.is_empty() {
        return Err(TegamiError::Config("No target user ids configured".to_string()));
    }
    Ok(ids)
}
