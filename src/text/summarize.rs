//! # Message Summarizer
//!
//! Prepares a chat message body for a narrow receipt.
//!
//! ## Pipeline
//!
//! ```text
//! "see https://example.com/x and more"
//!        │
//!        ▼  split into plain spans and URLs (document order)
//! ["see ", URL, " and more"]
//!        │
//!        ▼  plain spans: truncate to max_display_length + elision marker
//!        ▼  URLs: resolve title (fallback: URL), hard-cut, wrap in [ ]
//! "see [Example Do] and more"          urls: [(https://example.com/x, "Example Do")]
//!        │
//!        ▼  greedy word wrap at max_line_length
//! "see [Example Do]\nand more"
//! ```
//!
//! All lengths count Unicode scalar values, so a kanji counts as one column.
//! Plain spans get a visible elision marker; URL labels are cut silently
//! because the QR code below carries the full link anyway.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::title::TitleResolver;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL regex is valid"));

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"XXXXX\[残り(\d+)文字\]$").expect("marker regex is valid"));

/// Layout limits for a summarized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryOptions {
    /// Wrap column, in characters
    pub max_line_length: usize,
    /// Longest plain-text span kept before eliding the rest
    pub max_display_length: usize,
    /// Longest URL label kept (no marker)
    pub url_caption_max_length: usize,
}

impl SummaryOptions {
    pub fn new(max_line_length: usize, max_display_length: usize, url_caption_max_length: usize) -> Self {
        Self {
            max_line_length,
            max_display_length,
            url_caption_max_length,
        }
    }
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self::new(30, 900, 15)
    }
}

/// A link found in a message and the label printed in its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRef {
    pub url: String,
    pub label: String,
}

/// Wrapped text plus the links it referenced, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub urls: Vec<UrlRef>,
}

/// Summarize a message body for printing.
///
/// Each URL occurrence yields one [`UrlRef`]; repeats are not merged.
pub async fn summarize(text: &str, opts: &SummaryOptions, resolver: &dyn TitleResolver) -> Summary {
    let mut combined = String::with_capacity(text.len());
    let mut urls = Vec::new();
    let mut last = 0;

    for m in URL_RE.find_iter(text) {
        let plain = &text[last..m.start()];
        if !plain.is_empty() {
            combined.push_str(&truncate(plain, opts.max_display_length));
        }

        let url = m.as_str();
        let title = resolver.resolve(url).await.unwrap_or_else(|| url.to_string());
        let label = hard_cut(&title, opts.url_caption_max_length);
        debug!(url, label = %label, "replacing URL with label");

        combined.push('[');
        combined.push_str(&label);
        combined.push(']');
        urls.push(UrlRef {
            url: url.to_string(),
            label,
        });

        last = m.end();
    }

    let rest = &text[last..];
    if !rest.is_empty() {
        combined.push_str(&truncate(rest, opts.max_display_length));
    }

    Summary {
        text: wrap(&combined, opts.max_line_length),
        urls,
    }
}

/// The elision marker appended to truncated spans.
pub fn elision_marker(dropped: usize) -> String {
    format!("XXXXX[残り{}文字]", dropped)
}

/// Cut `s` to `max_len` characters and append an elision marker.
///
/// A span that already ends in a marker is measured without it, and any
/// further cut adds to the count in that marker, so applying this twice
/// gives the same result as applying it once.
pub fn truncate(s: &str, max_len: usize) -> String {
    let (body, already_dropped) = match MARKER_RE.captures(s) {
        Some(caps) => {
            let start = caps.get(0).map_or(s.len(), |m| m.start());
            let count = caps[1].parse::<usize>().unwrap_or(0);
            (&s[..start], count)
        }
        None => (s, 0),
    };

    let len = body.chars().count();
    if len <= max_len {
        return s.to_string();
    }

    let dropped = already_dropped + (len - max_len);
    let mut out = hard_cut(body, max_len);
    out.push_str(&elision_marker(dropped));
    out
}

/// First `max_len` characters of `s`, no marker.
pub fn hard_cut(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}

/// Greedy word wrap.
///
/// Whitespace runs (newlines included) collapse to single spaces, and lines
/// break at the last space that keeps them within `width` characters. A word
/// longer than `width` sits alone on its line without being split.
///
/// Runs of spaces inside a line are not kept either, so indentation and
/// double spacing in the input do not survive.
pub fn wrap(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

// ============================================================================
// TESTS
// ============================================================================
