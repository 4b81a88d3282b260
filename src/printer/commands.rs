//! # Raster Print Commands
//!
//! Byte sequences for printing one composed job as a raster image, then
//! feeding and cutting.
//!
//! ## Dialects
//!
//! | Command | StarPRNT | ESC/POS |
//! |---------|----------|---------|
//! | Initialize | `ESC @` | `ESC @` |
//! | Raster | `ESC GS S 1 xL xH yL yH 0 d...` | `GS v 0 0 xL xH yL yH d...` |
//! | Feed | `LF` × n | `LF` × n |
//! | Cut | `ESC d 2` (feed + full cut) | `GS V 0` (full cut) |
//!
//! Star mC-Print3 units speak StarPRNT natively and ESC/POS in emulation
//! mode; most other network receipt printers only speak ESC/POS.
//!
//! ## Byte Order
//!
//! `xL xH` is the row stride in bytes and `yL yH` the row count, both
//! little-endian.
//!
//! ## Chunking
//!
//! Tall jobs are split into bands of [`RASTER_CHUNK_ROWS`] rows, each its own
//! raster command, so the printer's receive buffer never has to hold the
//! whole image.

use super::config::PrinterConfig;

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;
pub const LF: u8 = 0x0A;

/// Rows per raster command.
pub const RASTER_CHUNK_ROWS: usize = 256;

/// Printer command language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    StarPrnt,
    EscPos,
}

impl Dialect {
    /// Parse a CLI name (`star`, `starprnt`, `escpos`, `esc/pos`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "star" | "starprnt" => Some(Self::StarPrnt),
            "escpos" | "esc/pos" | "esc-pos" => Some(Self::EscPos),
            _ => None,
        }
    }
}

#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

/// Reset the printer to its power-on state (`ESC @`).
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

/// One raster image command.
///
/// `data` holds `height` rows of `width_bytes` packed bytes each, MSB =
/// leftmost dot, 1 = black.
pub fn raster(dialect: Dialect, width_bytes: u16, height: u16, data: &[u8]) -> Vec<u8> {
    debug_assert_eq!(data.len(), width_bytes as usize * height as usize);

    let [xl, xh] = u16_le(width_bytes);
    let [yl, yh] = u16_le(height);

    let mut cmd = Vec::with_capacity(9 + data.len());
    match dialect {
        Dialect::StarPrnt => {
            cmd.extend_from_slice(&[ESC, GS, b'S', 1, xl, xh, yl, yh, 0]);
        }
        Dialect::EscPos => {
            cmd.extend_from_slice(&[GS, b'v', b'0', 0, xl, xh, yl, yh]);
        }
    }
    cmd.extend_from_slice(data);
    cmd
}

/// Feed `lines` blank lines.
#[inline]
pub fn feed_lines(lines: u8) -> Vec<u8> {
    vec![LF; lines as usize]
}

/// Full cut.
#[inline]
pub fn cut(dialect: Dialect) -> Vec<u8> {
    match dialect {
        Dialect::StarPrnt => vec![ESC, b'd', 2],
        Dialect::EscPos => vec![GS, b'V', 0],
    }
}

/// A complete job: init, raster bands, feed, cut.
///
/// `rows` is packed raster data `width_bytes` wide (see
/// [`crate::render::dither::to_raster`]).
pub fn print_job(dialect: Dialect, printer: &PrinterConfig, width_bytes: u16, rows: &[u8]) -> Vec<u8> {
    let mut out = init();

    let stride = width_bytes.max(1) as usize;
    for band in rows.chunks(stride * RASTER_CHUNK_ROWS) {
        let height = (band.len() / stride) as u16;
        out.extend(raster(dialect, width_bytes, height, band));
    }

    out.extend(feed_lines(printer.feed_lines));
    out.extend(cut(dialect));
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_raster_header() {
        let data = vec![0xAA; 72 * 100];
        let cmd = raster(Dialect::StarPrnt, 72, 100, &data);
        assert_eq!(&cmd[0..9], &[0x1B, 0x1D, 0x53, 1, 72, 0, 100, 0, 0]);
        assert_eq!(cmd.len(), 9 + data.len());
    }

    #[test]
    fn test_escpos_raster_header() {
        let data = vec![0xFF; 48 * 300];
        let cmd = raster(Dialect::EscPos, 48, 300, &data);
        // 300 = 0x012C
        assert_eq!(&cmd[0..8], &[0x1D, 0x76, 0x30, 0, 48, 0, 0x2C, 0x01]);
        assert_eq!(cmd.len(), 8 + data.len());
    }

    #[test]
    fn test_cut_bytes() {
        assert_eq!(cut(Dialect::StarPrnt), vec![0x1B, 0x64, 2]);
        assert_eq!(cut(Dialect::EscPos), vec![0x1D, 0x56, 0]);
    }

    #[test]
    fn test_print_job_chunks_tall_images() {
        let printer = PrinterConfig::NARROW_58MM;
        let rows = vec![0u8; 48 * 600];
        let job = print_job(Dialect::EscPos, &printer, 48, &rows);

        // init + 3 bands (256 + 256 + 88) + 5 LF + cut
        let expected = 2 + 3 * 8 + rows.len() + 5 + 3;
        assert_eq!(job.len(), expected);
        assert_eq!(&job[0..2], &[0x1B, 0x40]);
        assert_eq!(&job[job.len() - 3..], &[0x1D, 0x56, 0]);

        // last band height is 88 rows
        let last_band = 2 + 2 * (8 + 48 * 256);
        assert_eq!(job[last_band + 6], 88);
    }

    #[test]
    fn test_dialect_parse() {
        assert_eq!(Dialect::parse("STAR"), Some(Dialect::StarPrnt));
        assert_eq!(Dialect::parse("esc/pos"), Some(Dialect::EscPos));
        assert_eq!(Dialect::parse("zpl"), None);
    }
}
