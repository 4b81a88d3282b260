//! # Job Builder
//!
//! Decides which events print and assembles their jobs.
//!
//! Building a job has two halves:
//!
//! 1. [`JobBuilder::handle`] is pure: it classifies a chat event and either
//!    returns a [`JobSpec`] or `None`. No network, no disk.
//! 2. [`JobBuilder::build`] does the I/O: page titles for links, attachment
//!    downloads, and the QR footer image.
//!
//! ## Classification
//!
//! | Event | Target user involved | Result |
//! |-------|----------------------|--------|
//! | Direct message | n/a | `dm` job, sender anonymized |
//! | Guild message | mentioned | `mention` job |
//! | Guild message | replied to (not mentioned) | `reply` job |
//! | Guild message | neither | no job |

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::events::{ChatEvent, Origin, SheetRow, clean_markup};
use super::{Part, PrintJob};
use crate::config::RenderConfig;
use crate::error::{Result, TegamiError};
use crate::render::compositor;
use crate::render::qr::QrComposer;
use crate::text::{TitleResolver, UrlRef, summarize};

const RULE: &str = "================================================";

/// Display name recorded for direct-message senders.
pub const ANONYMOUS_SENDER: &str = "匿名ユーザー";

/// Header printed above spreadsheet responses.
pub const SHEET_HEADER: &str = "--- 新規メッセージ ---";

/// Why a chat event is being printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Dm,
    Mention,
    Reply,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Dm => "dm",
            JobKind::Mention => "mention",
            JobKind::Reply => "reply",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to build a job, extracted from one chat event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub kind: JobKind,
    pub sender_name: String,
    pub server: Option<String>,
    pub channel: Option<String>,
    /// Message text with platform markup removed
    pub content: String,
    /// Image attachments to download, in message order
    pub image_urls: Vec<String>,
}

impl JobSpec {
    /// The boxed banner printed at the top of the receipt.
    pub fn header_text(&self) -> String {
        match self.kind {
            JobKind::Dm => format!("{RULE}\nDM Message\nfrom Anonymous\n{RULE}\n"),
            JobKind::Mention | JobKind::Reply => {
                let server = non_empty_or_na(self.server.as_deref());
                let channel = non_empty_or_na(self.channel.as_deref());
                format!(
                    "{RULE}\nDiscord {} !!!!\nfrom {}\nServer: {}\nChannel: #{}\n{RULE}\n",
                    self.kind, self.sender_name, server, channel
                )
            }
        }
    }
}

fn non_empty_or_na(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "N/A",
    }
}

/// Downloads attachment bytes.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Attachment downloads over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAttachmentFetcher {
    client: reqwest::Client,
}

impl HttpAttachmentFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("tegami/0.1")
            .build()
            .map_err(|e| TegamiError::Config(format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AttachmentFetcher for HttpAttachmentFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TegamiError::Image(format!("Failed to download {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(TegamiError::Image(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TegamiError::Image(format!("Failed to read attachment data: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// Turns chat events and sheet rows into print jobs.
pub struct JobBuilder {
    config: Arc<RenderConfig>,
    target_user_ids: HashSet<u64>,
    resolver: Arc<dyn TitleResolver>,
    fetcher: Arc<dyn AttachmentFetcher>,
}

impl JobBuilder {
    pub fn new(
        config: Arc<RenderConfig>,
        target_user_ids: HashSet<u64>,
        resolver: Arc<dyn TitleResolver>,
        fetcher: Arc<dyn AttachmentFetcher>,
    ) -> Self {
        Self {
            config,
            target_user_ids,
            resolver,
            fetcher,
        }
    }

    pub fn resolver(&self) -> &dyn TitleResolver {
        self.resolver.as_ref()
    }

    /// Decide whether an event prints, and extract what the job needs.
    pub fn handle(&self, event: &ChatEvent) -> Option<JobSpec> {
        let image_urls = event
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .map(|a| a.url.clone())
            .collect();

        let (kind, sender_name, server, channel) = match &event.origin {
            Origin::DirectMessage => (JobKind::Dm, ANONYMOUS_SENDER.to_string(), None, None),
            Origin::Guild {
                server,
                channel,
                mentioned_ids,
                reply_to_author,
            } => {
                let mentioned = mentioned_ids.iter().any(|id| self.target_user_ids.contains(id));
                let replied = reply_to_author.is_some_and(|id| self.target_user_ids.contains(&id));
                let kind = if mentioned {
                    JobKind::Mention
                } else if replied {
                    JobKind::Reply
                } else {
                    debug!(message_id = event.message_id, "guild message not addressed to a target user");
                    return None;
                };
                (
                    kind,
                    event.sender_name.clone(),
                    Some(server.clone()),
                    Some(channel.clone()),
                )
            }
        };

        info!(message_id = event.message_id, %kind, sender = %sender_name, "chat event accepted");
        Some(JobSpec {
            kind,
            sender_name,
            server,
            channel,
            content: clean_markup(&event.content),
            image_urls,
        })
    }

    /// Build the wire job: summarized body, downloaded images, QR footer.
    ///
    /// Attachments that fail to download are skipped, as are links whose QR
    /// symbol cannot be drawn.
    pub async fn build(&self, spec: JobSpec) -> Result<PrintJob> {
        let summary = summarize(&spec.content, &self.config.summary, self.resolver.as_ref()).await;

        let mut body_images = Vec::with_capacity(spec.image_urls.len());
        for url in &spec.image_urls {
            match self.fetcher.fetch(url).await {
                Ok(bytes) => {
                    debug!(url, size = bytes.len(), "downloaded attachment");
                    body_images.push(bytes);
                }
                Err(e) => warn!(url, error = %e, "skipping attachment"),
            }
        }

        let footer = self.render_footer(&summary.urls)?.map(Part::Image);

        Ok(PrintJob {
            header: Some(Part::Text(spec.header_text())),
            body_text: Some(summary.text),
            body_images,
            footer,
        })
    }

    /// Build the job for a spreadsheet response. Blank rows print nothing.
    pub async fn build_sheet_row(&self, row: &SheetRow) -> Option<PrintJob> {
        if row.is_blank() {
            debug!(row = row.index, "skipping blank sheet row");
            return None;
        }

        let summary = summarize(&row.text, &self.config.summary, self.resolver.as_ref()).await;
        Some(PrintJob {
            header: Some(Part::Text(SHEET_HEADER.to_string())),
            body_text: Some(summary.text),
            body_images: Vec::new(),
            footer: Some(Part::Text(format!("受付: 行 {}", row.index))),
        })
    }

    /// Render one QR bitmap per link and stack them into a PNG.
    ///
    /// Returns `None` when there are no links (or none could be drawn).
    pub fn render_footer(&self, urls: &[UrlRef]) -> Result<Option<Vec<u8>>> {
        if urls.is_empty() {
            return Ok(None);
        }

        let composer = QrComposer::new(&self.config.caption_font, self.config.paper_width());
        let bitmaps: Vec<_> = urls
            .iter()
            .filter_map(|url_ref| {
                composer
                    .render(&url_ref.url, &url_ref.label, &self.config.footer_qr)
                    .map_err(|e| warn!(url = %url_ref.url, error = %e, "skipping QR code"))
                    .ok()
            })
            .collect();

        match compositor::stack_vertically(&bitmaps, self.config.paper_width(), self.config.padding) {
            Some(footer) => Ok(Some(compositor::encode_png(&footer)?)),
            None => Ok(None),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::events::Attachment;
    use crate::printer::PrinterConfig;
    use crate::text::{NoTitles, StaticTitles};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const TARGET: u64 = 1000;

    struct MapFetcher(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl AttachmentFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| TegamiError::Image(format!("404 {}", url)))
        }
    }

    fn builder_with(resolver: Arc<dyn TitleResolver>, files: HashMap<String, Vec<u8>>) -> JobBuilder {
        JobBuilder::new(
            Arc::new(RenderConfig::builtin(PrinterConfig::NARROW_58MM)),
            HashSet::from([TARGET]),
            resolver,
            Arc::new(MapFetcher(files)),
        )
    }

    fn builder() -> JobBuilder {
        builder_with(Arc::new(NoTitles), HashMap::new())
    }

    fn guild_event(mentioned_ids: Vec<u64>, reply_to_author: Option<u64>) -> ChatEvent {
        ChatEvent {
            message_id: 1,
            sender_id: 7,
            sender_name: "alice".into(),
            content: "<@1000> hello".into(),
            attachments: vec![],
            origin: Origin::Guild {
                server: "Makers".into(),
                channel: "general".into(),
                mentioned_ids,
                reply_to_author,
            },
        }
    }

    #[test]
    fn test_dm_is_anonymous() {
        let event = ChatEvent {
            origin: Origin::DirectMessage,
            ..guild_event(vec![], None)
        };
        let spec = builder().handle(&event).unwrap();
        assert_eq!(spec.kind, JobKind::Dm);
        assert_eq!(spec.sender_name, ANONYMOUS_SENDER);
        assert_eq!(spec.content, "hello");
        assert!(spec.header_text().contains("from Anonymous"));
        assert!(!spec.header_text().contains("alice"));
    }

    #[test]
    fn test_mention_wins_over_reply() {
        let spec = builder().handle(&guild_event(vec![TARGET], Some(TARGET))).unwrap();
        assert_eq!(spec.kind, JobKind::Mention);

        let spec = builder().handle(&guild_event(vec![42], Some(TARGET))).unwrap();
        assert_eq!(spec.kind, JobKind::Reply);
    }

    #[test]
    fn test_untargeted_guild_message_is_ignored() {
        assert!(builder().handle(&guild_event(vec![42], Some(43))).is_none());
        assert!(builder().handle(&guild_event(vec![], None)).is_none());
    }

    #[test]
    fn test_guild_header_text() {
        let spec = builder().handle(&guild_event(vec![TARGET], None)).unwrap();
        assert_eq!(
            spec.header_text(),
            format!("{RULE}\nDiscord mention !!!!\nfrom alice\nServer: Makers\nChannel: #general\n{RULE}\n")
        );
    }

    #[test]
    fn test_only_image_attachments_are_collected() {
        let mut event = guild_event(vec![TARGET], None);
        event.attachments = vec![
            Attachment {
                filename: "a.png".into(),
                url: "https://cdn/a.png".into(),
                content_type: Some("image/png".into()),
            },
            Attachment {
                filename: "notes.txt".into(),
                url: "https://cdn/notes.txt".into(),
                content_type: Some("text/plain".into()),
            },
        ];
        let spec = builder().handle(&event).unwrap();
        assert_eq!(spec.image_urls, vec!["https://cdn/a.png".to_string()]);
    }

    #[tokio::test]
    async fn test_build_skips_failed_downloads() {
        let files = HashMap::from([("https://cdn/ok.png".to_string(), vec![1, 2, 3])]);
        let builder = builder_with(Arc::new(NoTitles), files);
        let spec = JobSpec {
            kind: JobKind::Dm,
            sender_name: ANONYMOUS_SENDER.into(),
            server: None,
            channel: None,
            content: "hi".into(),
            image_urls: vec!["https://cdn/missing.png".into(), "https://cdn/ok.png".into()],
        };
        let job = builder.build(spec).await.unwrap();
        assert_eq!(job.body_images, vec![vec![1, 2, 3]]);
        assert_eq!(job.body_text.as_deref(), Some("hi"));
        assert!(job.footer.is_none());
    }

    #[tokio::test]
    async fn test_build_renders_qr_footer() {
        let resolver = Arc::new(StaticTitles::new([("https://example.com/", "Example Domain")]));
        let builder = builder_with(resolver, HashMap::new());
        let spec = builder
            .handle(&guild_event(vec![TARGET], None))
            .map(|mut spec| {
                spec.content = "look https://example.com/".into();
                spec
            })
            .unwrap();

        let job = builder.build(spec).await.unwrap();
        assert_eq!(job.body_text.as_deref(), Some("look [Example Domain]"));

        let Some(Part::Image(png)) = job.footer else {
            panic!("expected an image footer");
        };
        let footer = compositor::image_from_bytes(&png).unwrap();
        assert_eq!(footer.width(), 384);
    }

    #[tokio::test]
    async fn test_sheet_row_job() {
        let builder = builder();
        let job = builder
            .build_sheet_row(&SheetRow {
                index: 12,
                text: "ありがとう".into(),
            })
            .await
            .unwrap();
        assert_eq!(job.header, Some(Part::Text(SHEET_HEADER.into())));
        assert_eq!(job.body_text.as_deref(), Some("ありがとう"));
        assert_eq!(job.footer, Some(Part::Text("受付: 行 12".into())));

        let blank = SheetRow {
            index: 13,
            text: " ".into(),
        };
        assert!(builder.build_sheet_row(&blank).await.is_none());
    }
}
