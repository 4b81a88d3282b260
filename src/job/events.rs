//! Inputs that can trigger a print job.
//!
//! Chat SDK listeners and the spreadsheet poller live outside this crate.
//! They translate platform objects into these plain structs and hand them to
//! [`JobBuilder`](super::JobBuilder).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<@!?\d+>|<#\d+>|<@&\d+>|<https?://\S+>").expect("markup regex is valid")
});

/// Where a chat message was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    DirectMessage,
    Guild {
        server: String,
        channel: String,
        /// Users mentioned in the message
        #[serde(default)]
        mentioned_ids: Vec<u64>,
        /// Author of the message being replied to, if any
        #[serde(default)]
        reply_to_author: Option<u64>,
    },
}

/// A file attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Attachment {
    /// Whether the attachment should be downloaded and printed.
    ///
    /// The platform's content type wins; without one, the file extension
    /// decides.
    pub fn is_image(&self) -> bool {
        match &self.content_type {
            Some(content_type) => content_type.starts_with("image/"),
            None => mime_guess::from_path(&self.filename)
                .first()
                .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE),
        }
    }
}

/// A chat message as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub message_id: u64,
    pub sender_id: u64,
    pub sender_name: String,
    /// Raw message text, platform markup included
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub origin: Origin,
}

impl ChatEvent {
    pub fn is_direct_message(&self) -> bool {
        matches!(self.origin, Origin::DirectMessage)
    }
}

/// One response row from the spreadsheet form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    /// 1-based row number in the sheet
    pub index: u64,
    pub text: String,
}

impl SheetRow {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Strip user, channel and role mentions and suppressed-embed links.
pub fn clean_markup(content: &str) -> String {
    MARKUP_RE.replace_all(content, "").trim().to_string()
}
