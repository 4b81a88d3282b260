//! # Printer Configuration
//!
//! This module defines hardware specifications for supported thermal printers.
//!
//! ## Supported Printers
//!
//! | Preset | Width (dots) | Resolution | Paper |
//! |--------|--------------|------------|-------|
//! | `MC_PRINT3` | 576 | 203 DPI | 80mm |
//! | `NARROW_58MM` | 384 | 203 DPI | 58mm |
//!
//! ## Usage
//!
//! ```
//! use tegami::printer::PrinterConfig;
//!
//! let config = PrinterConfig::MC_PRINT3;
//! println!("Paper width: {} dots ({} bytes)",
//!          config.width_dots,
//!          config.width_bytes);
//! ```

/// Widest paper accepted by [`PrinterConfig::parse`] (a 4-inch head at 203 DPI is 832).
pub const MAX_WIDTH_DOTS: u16 = 2048;

/// # Printer Configuration
///
/// Defines the hardware characteristics of a thermal printer.
///
/// ## Physical Properties
///
/// - **width_dots**: Paper width in dots. Every composed job is exactly this wide.
/// - **width_bytes**: Width in bytes (width_dots / 8), the raster row stride
/// - **dpi**: Resolution in dots per inch
/// - **feed_lines**: Blank lines fed after a job, before the cut
///
/// ## Calculations
///
/// ```text
/// dots_per_mm = dpi / 25.4
/// width_mm = width_dots / dots_per_mm
///
/// For mC-Print3:
///   dots_per_mm = 203 / 25.4 ≈ 8
///   width_mm = 576 / 8 = 72mm
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterConfig {
    /// Printer model name
    pub name: &'static str,

    /// Paper width in dots (pixels)
    pub width_dots: u16,

    /// Row stride in bytes (width_dots / 8)
    pub width_bytes: u16,

    /// Resolution in dots per inch
    pub dpi: u16,

    /// Line feeds emitted after the raster image, before cutting
    pub feed_lines: u8,
}

impl PrinterConfig {
    /// # Star mC-Print3 Configuration
    ///
    /// 80mm paper, 72mm printable (576 dots) at 203 DPI, auto-cutter.
    pub const MC_PRINT3: Self = Self {
        name: "Star mC-Print3",
        width_dots: 576,
        width_bytes: 72,
        dpi: 203,
        feed_lines: 5,
    };

    /// # Generic 58mm Printer
    ///
    /// 48mm printable (384 dots) at 203 DPI.
    pub const NARROW_58MM: Self = Self {
        name: "58mm thermal",
        width_dots: 384,
        width_bytes: 48,
        dpi: 203,
        feed_lines: 5,
    };

    /// A configuration for an arbitrary paper width.
    ///
    /// The width is rounded up to a whole byte so raster rows never need
    /// partial-byte padding.
    pub fn with_width(width_dots: u16) -> Self {
        let width_bytes = width_dots.div_ceil(8);
        Self {
            name: "custom",
            width_dots: width_bytes * 8,
            width_bytes,
            ..Self::MC_PRINT3
        }
    }

    /// Parse a preset name.
    ///
    /// Formats:
    /// - `"mcp31"` / `"mc-print3"` → [`PrinterConfig::MC_PRINT3`]
    /// - `"58mm"` → [`PrinterConfig::NARROW_58MM`]
    /// - `"width:N"` → [`PrinterConfig::with_width`]
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "mcp31" | "mc-print3" | "80mm" => Ok(Self::MC_PRINT3),
            "58mm" => Ok(Self::NARROW_58MM),
            other if other.starts_with("width:") => {
                let dims = &other["width:".len()..];
                let width: u16 = dims
                    .parse()
                    .map_err(|_| format!("Invalid width: {}", dims))?;
                if width == 0 || width > MAX_WIDTH_DOTS {
                    return Err(format!("Width must be between 1 and {}", MAX_WIDTH_DOTS));
                }
                Ok(Self::with_width(width))
            }
            _ => Err(format!(
                "Unknown printer '{}'. Use 'mcp31', '58mm' or 'width:N'",
                s
            )),
        }
    }

    /// Calculate dots per millimeter
    ///
    /// ## Example
    ///
    /// ```
    /// use tegami::printer::PrinterConfig;
    ///
    /// let config = PrinterConfig::MC_PRINT3;
    /// assert!((config.dots_per_mm() - 8.0).abs() < 0.1);
    /// ```
    #[inline]
    pub fn dots_per_mm(&self) -> f32 {
        self.dpi as f32 / 25.4
    }

    /// Calculate print width in millimeters
    #[inline]
    pub fn width_mm(&self) -> f32 {
        self.width_dots as f32 / self.dots_per_mm()
    }

    /// Convert millimeters to dots
    #[inline]
    pub fn mm_to_dots(&self, mm: f32) -> u16 {
        (mm * self.dots_per_mm()).round() as u16
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self::MC_PRINT3
    }
}

// ============================================================================
// TESTS
// ============================================================================
