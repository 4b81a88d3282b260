//! # Text Preparation
//!
//! Turns raw message bodies into print-ready text.
//!
//! - [`summarize`]: URL labelling, truncation and word wrap
//! - [`title`]: page title lookup behind the [`TitleResolver`] trait

pub mod summarize;
pub mod title;

pub use summarize::{Summary, SummaryOptions, UrlRef, summarize};
pub use title::{HttpTitleResolver, NoTitles, StaticTitles, TitleResolver};
