//! # Printer Module
//!
//! Printer hardware, command encoding and output sinks.
//!
//! ## Modules
//!
//! - [`config`]: Printer hardware specifications
//! - [`commands`]: StarPRNT / ESC/POS raster, feed and cut commands
//! - [`sink`]: The [`PrintSink`] seam plus network and PNG implementations

pub mod commands;
pub mod config;
pub mod sink;

pub use commands::Dialect;
pub use config::PrinterConfig;
pub use sink::{NetworkPrinter, PngDirSink, PrintSink};
