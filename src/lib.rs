//! # Tegami - Chat to Thermal Printer Relay
//!
//! Tegami turns chat messages into receipts. A bot side classifies chat
//! events, summarizes the text, downloads attachments and renders QR codes
//! for the links it shortened; a receiver side composes everything into one
//! paper-width bitmap and hands it to a printer.
//!
//! - **Text**: line wrapping, truncation with elision markers, link titles
//! - **Rendering**: text bitmaps, QR symbols with captions, vertical stacking
//! - **Jobs**: header/body/footer print jobs and their wire format
//! - **Transport**: sentinel-framed JSON over TCP
//! - **Printers**: raster command streams for StarPRNT and ESC/POS
//!
//! ## Pipeline
//!
//! ```text
//!  ChatEvent ──▶ JobBuilder ──▶ PrintJob ──▶ JobSender ══TCP══▶ JobReceiver
//!                 │  summarize                                  │ compose
//!                 │  fetch images                               ▼
//!                 │  QR footer                              PrintSink
//!                 ▼                                    (printer / PNG dir)
//!           TitleResolver
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use tegami::{config::RenderConfig, job::{compose, PrintJob}};
//!
//! let config = RenderConfig::default();
//! let job = PrintJob {
//!     body_text: Some("hello".to_string()),
//!     ..Default::default()
//! };
//!
//! let img = compose(&job, &config).unwrap();
//! assert_eq!(img.width(), config.paper_width());
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`text`] | Message summarizer and link title lookup |
//! | [`render`] | Fonts, text bitmaps, QR codes, stacking, dithering |
//! | [`job`] | Chat events, job builder, job composition |
//! | [`transport`] | Wire codec, sender and receiver |
//! | [`printer`] | Printer presets, command streams, print sinks |
//! | [`store`] | Greeted-user ledger |
//! | [`server`] | HTTP preview server |
//! | [`config`] | Shared render configuration |
//! | [`error`] | Error types |

pub mod config;
pub mod error;
pub mod job;
pub mod printer;
pub mod render;
pub mod server;
pub mod store;
pub mod text;
pub mod transport;

// Re-exports for convenience
pub use config::RenderConfig;
pub use error::{Result, TegamiError};
pub use job::{JobBuilder, PrintJob};
pub use printer::PrinterConfig;
pub use transport::{JobReceiver, JobSender};
