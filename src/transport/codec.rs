//! # Job Framing
//!
//! One connection carries one job:
//!
//! ```text
//! ┌──────────────────────────────────────┬───────────────────────┐
//! │ JSON job (every '<' written \u003c) │ <END_OF_TRANSMISSION> │
//! └──────────────────────────────────────┴───────────────────────┘
//! ```
//!
//! Escaping `<` keeps the JSON free of the sentinel's first byte, so the
//! first sentinel in the stream always ends the frame, whatever the message
//! text contains. Base64 image data never contains `<` to begin with.

use crate::error::{Result, TegamiError};
use crate::job::PrintJob;

/// End-of-frame marker.
pub const SENTINEL: &[u8] = b"<END_OF_TRANSMISSION>";

/// Largest frame the receiver will buffer.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Serialize a job into a complete frame, sentinel included.
pub fn encode(job: &PrintJob) -> Result<Vec<u8>> {
    let json = serde_json::to_string(job)
        .map_err(|e| TegamiError::Codec(format!("Failed to serialize job: {}", e)))?;

    // '<' only occurs inside JSON strings, where the escape is equivalent
    let mut frame = json.replace('<', r"\u003c").into_bytes();
    frame.extend_from_slice(SENTINEL);
    Ok(frame)
}

/// Parse a frame. The sentinel and anything after it are ignored; a frame
/// cut off by EOF without a sentinel is accepted as-is.
pub fn decode(frame: &[u8]) -> Result<PrintJob> {
    let payload = match find_sentinel(frame, 0) {
        Some(pos) => &frame[..pos],
        None => frame,
    };
    serde_json::from_slice(payload.trim_ascii())
        .map_err(|e| TegamiError::Codec(format!("Malformed job: {}", e)))
}

/// Position of the first sentinel at or after `from`.
pub fn find_sentinel(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(SENTINEL.len())
        .position(|w| w == SENTINEL)
        .map(|pos| from + pos)
}
