//! # Error Types
//!
//! This module defines error types used throughout the tegami library.
//!
//! Most failures in the print pipeline are recoverable and never reach this
//! type: a missing font falls back to the built-in bitmap font, an
//! unreachable URL keeps the URL as its label, and an undecodable attachment
//! is dropped from the job. What remains here are the failures a caller has
//! to act on.

use thiserror::Error;

/// Main error type for tegami operations
#[derive(Debug, Error)]
pub enum TegamiError {
    /// Transport-level errors (connection refused, send failure)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed job on the wire
    #[error("Codec error: {0}")]
    Codec(String),

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Font file could not be parsed
    #[error("Font error: {0}")]
    Font(String),

    /// QR symbol could not be encoded
    #[error("QR error: {0}")]
    Qr(String),

    /// Durable id ledger could not be read or written
    #[error("Store error: {0}")]
    Store(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, TegamiError>;
