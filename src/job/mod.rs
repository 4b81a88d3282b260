//! # Print Jobs
//!
//! A print job is the unit that travels from a bot to the receiver: an
//! optional header, body text, attached images and an optional footer.
//!
//! ## Wire Shape
//!
//! ```text
//! {
//!   "header":      {"type": "text",  "content": "=====\nDM Message\n..."},
//!   "body_text":   "hello [Example Do]",
//!   "body_images": ["iVBORw0KGgo...", ...],          base64
//!   "footer":      {"type": "image", "content": "iVBORw0KGgo..."}
//! }
//! ```
//!
//! ## Modules
//!
//! - [`events`]: chat events, spreadsheet rows, markup cleaning
//! - [`builder`]: event → [`PrintJob`] (summarize, download, QR footer)
//! - [`compose`]: [`PrintJob`] → one paper-width bitmap
//! - [`relay`]: event → greeting and dispatched job, sheet polling

pub mod builder;
pub mod compose;
pub mod events;
pub mod relay;

use serde::{Deserialize, Serialize};

pub use builder::{AttachmentFetcher, HttpAttachmentFetcher, JobBuilder, JobKind, JobSpec};
pub use compose::compose;
pub use events::{Attachment, ChatEvent, Origin, SheetRow, clean_markup};
pub use relay::Relay;

/// Where a fragment sits on the receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Header,
    Body,
    Footer,
}

/// Fragment payload. Image bytes are in any encoded format; the decoder
/// sniffs the format from the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentContent {
    Text(String),
    Image(Vec<u8>),
}

/// One logical piece of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub section: Section,
    pub content: FragmentContent,
}

/// Header or footer content on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Part {
    Text(String),
    Image(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl From<Part> for FragmentContent {
    fn from(part: Part) -> Self {
        match part {
            Part::Text(text) => FragmentContent::Text(text),
            Part::Image(bytes) => FragmentContent::Image(bytes),
        }
    }
}

/// A print job as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrintJob {
    #[serde(default)]
    pub header: Option<Part>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default, with = "base64_list")]
    pub body_images: Vec<Vec<u8>>,
    #[serde(default)]
    pub footer: Option<Part>,
}

impl PrintJob {
    /// Flatten into fragments: header, body text, body images, footer.
    ///
    /// Empty text parts are dropped; they would only print a blank band.
    pub fn fragments(&self) -> Vec<Fragment> {
        let mut out = Vec::with_capacity(3 + self.body_images.len());

        if let Some(header) = &self.header {
            push_part(&mut out, Section::Header, header);
        }
        if let Some(text) = &self.body_text
            && !text.is_empty()
        {
            out.push(Fragment {
                section: Section::Body,
                content: FragmentContent::Text(text.clone()),
            });
        }
        for image in &self.body_images {
            out.push(Fragment {
                section: Section::Body,
                content: FragmentContent::Image(image.clone()),
            });
        }
        if let Some(footer) = &self.footer {
            push_part(&mut out, Section::Footer, footer);
        }

        out
    }

    /// True when the job would print nothing.
    pub fn is_empty(&self) -> bool {
        self.fragments().is_empty()
    }
}

fn push_part(out: &mut Vec<Fragment>, section: Section, part: &Part) {
    let empty = match part {
        Part::Text(text) => text.is_empty(),
        Part::Image(bytes) => bytes.is_empty(),
    };
    if !empty {
        out.push(Fragment {
            section,
            content: part.clone().into(),
        });
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

mod base64_list {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for bytes in items {
            seq.serialize_element(&STANDARD.encode(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
        encoded
            .into_iter()
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
