//! # Rendering Module
//!
//! Everything that produces or transforms pixels.
//!
//! ## Modules
//!
//! - [`font`]: Font loading and metrics, with a built-in bitmap fallback
//! - [`compositor`]: Text to bitmap, image bytes to bitmap, vertical stacking
//! - [`qr`]: QR symbols with centered captions
//! - [`dither`]: Grayscale to packed 1-bit raster rows
//! - [`heif`]: HEIC attachment detection and (optional) decoding
//!
//! ## Usage Example
//!
//! ```
//! use tegami::render::{compositor, dither, font::PrintFont};
//! use tegami::render::dither::DitheringAlgorithm;
//!
//! let font = PrintFont::builtin(24.0);
//! let header = compositor::text_to_bitmap("Discord mention !!!!", &font, 576);
//! let body = compositor::text_to_bitmap("hello", &font, 576);
//!
//! let job = compositor::stack_vertically(&[header, body], 576, 1).unwrap();
//! let raster = dither::to_raster(&job, DitheringAlgorithm::FloydSteinberg);
//! assert_eq!(raster.len(), 72 * job.height() as usize);
//! ```

pub mod compositor;
pub mod dither;
pub mod font;
pub mod heif;
pub mod qr;
