//! # Pipeline Tests
//!
//! End-to-end runs of the relay with the network parts pointed at loopback:
//!
//! - **Link**: `JobSender` → TCP → `JobReceiver` → capturing sink
//! - **Bot side**: chat event → `JobBuilder` → `compose`
//! - **Relay**: DM greetings, sheet rows that fail to send
//! - **Ledger**: greetings survive a restart

use async_trait::async_trait;
use image::{GrayImage, Luma};
use pretty_assertions::assert_eq;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use tegami::job::{
    self, Attachment, AttachmentFetcher, ChatEvent, JobBuilder, Origin, Part, PrintJob, Relay, SheetRow,
};
use tegami::printer::{PngDirSink, PrintSink, PrinterConfig};
use tegami::render::compositor;
use tegami::store::{GreetingSender, IdLedger, WELCOME_MESSAGE};
use tegami::text::{StaticTitles, UrlRef};
use tegami::transport::JobDispatch;
use tegami::transport::codec::{self, SENTINEL};
use tegami::{JobReceiver, JobSender, RenderConfig, Result, TegamiError};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Keeps every composed job in memory.
#[derive(Default)]
struct CaptureSink {
    jobs: Mutex<Vec<GrayImage>>,
}

impl CaptureSink {
    fn count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

#[async_trait]
impl PrintSink for CaptureSink {
    async fn print(&self, job: &GrayImage) -> Result<()> {
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

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

#[derive(Default)]
struct RecordingGreeter {
    greeted: Mutex<Vec<u64>>,
}

#[async_trait]
impl GreetingSender for RecordingGreeter {
    async fn send_greeting(&self, user_id: u64, message: &str) -> Result<()> {
        assert_eq!(message, WELCOME_MESSAGE);
        self.greeted.lock().unwrap().push(user_id);
        Ok(())
    }
}

/// Records dispatched jobs; the first `failures` calls fail.
#[derive(Default)]
struct RecordingDispatch {
    failures: usize,
    calls: AtomicUsize,
    jobs: Mutex<Vec<PrintJob>>,
}

#[async_trait]
impl JobDispatch for RecordingDispatch {
    async fn dispatch(&self, job: &PrintJob) -> Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(TegamiError::Transport("connection refused".into()));
        }
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

fn offline_builder(targets: HashSet<u64>) -> JobBuilder {
    JobBuilder::new(
        Arc::new(RenderConfig::builtin(PrinterConfig::NARROW_58MM)),
        targets,
        Arc::new(StaticTitles::default()),
        Arc::new(MapFetcher(HashMap::new())),
    )
}

/// Start a receiver on an ephemeral port and return its address.
async fn spawn_receiver(config: Arc<RenderConfig>, sink: Arc<dyn PrintSink>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let receiver = JobReceiver::new(config, sink);
    tokio::spawn(async move { receiver.serve(listener).await });
    addr
}

async fn wait_for_jobs(sink: &CaptureSink, expected: usize) {
    for _ in 0..100 {
        if sink.count() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("receiver printed {} jobs, expected {}", sink.count(), expected);
}

fn png_of(width: u32, height: u32, value: u8) -> Vec<u8> {
    compositor::encode_png(&GrayImage::from_pixel(width, height, Luma([value]))).unwrap()
}

fn has_ink(img: &GrayImage) -> bool {
    img.pixels().any(|p| p.0[0] < 128)
}

// ============================================================================
// LINK
// ============================================================================

#[tokio::test]
async fn test_sent_job_is_printed_at_paper_width() {
    let config = Arc::new(RenderConfig::default());
    let sink = Arc::new(CaptureSink::default());
    let addr = spawn_receiver(config.clone(), sink.clone()).await;

    let job = PrintJob {
        header: Some(Part::Text("HEADER".into())),
        body_text: Some("hello from the bot".into()),
        body_images: vec![png_of(100, 40, 0)],
        footer: Some(Part::Text("footer".into())),
    };
    JobSender::new(addr).send(&job).await.unwrap();

    wait_for_jobs(&sink, 1).await;
    let printed = sink.jobs.lock().unwrap()[0].clone();
    assert_eq!(printed.width(), config.paper_width());
    assert!(has_ink(&printed));
}

#[tokio::test]
async fn test_consecutive_jobs_print_separately() {
    let config = Arc::new(RenderConfig::builtin(PrinterConfig::NARROW_58MM));
    let sink = Arc::new(CaptureSink::default());
    let addr = spawn_receiver(config, sink.clone()).await;
    let sender = JobSender::new(addr);

    for text in ["one", "two", "three"] {
        let job = PrintJob {
            body_text: Some(text.into()),
            ..Default::default()
        };
        sender.send(&job).await.unwrap();
    }

    wait_for_jobs(&sink, 3).await;
    assert!(sink.jobs.lock().unwrap().iter().all(|img| img.width() == 384));
}

#[tokio::test]
async fn test_garbage_connection_does_not_stop_receiver() {
    use tokio::io::AsyncWriteExt;

    let config = Arc::new(RenderConfig::default());
    let sink = Arc::new(CaptureSink::default());
    let addr = spawn_receiver(config, sink.clone()).await;

    let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    stream.write_all(b"not json at all").await.unwrap();
    stream.write_all(SENTINEL).await.unwrap();
    stream.shutdown().await.unwrap();
    drop(stream);

    let job = PrintJob {
        body_text: Some("still alive".into()),
        ..Default::default()
    };
    JobSender::new(addr).send(&job).await.unwrap();

    wait_for_jobs(&sink, 1).await;
    assert_eq!(sink.count(), 1);
}

#[tokio::test]
async fn test_unreachable_receiver_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let job = PrintJob {
        body_text: Some("x".into()),
        ..Default::default()
    };
    let err = JobSender::new(addr).send(&job).await.unwrap_err();
    assert!(matches!(err, TegamiError::Transport(_)));
}

#[test]
fn test_sentinel_inside_text_does_not_end_frame() {
    let job = PrintJob {
        body_text: Some("quote: <END_OF_TRANSMISSION> end".into()),
        ..Default::default()
    };
    let frame = codec::encode(&job).unwrap();

    let first = codec::find_sentinel(&frame, 0).unwrap();
    assert_eq!(first, frame.len() - SENTINEL.len());
    assert_eq!(codec::decode(&frame).unwrap(), job);
}

#[tokio::test]
async fn test_png_dir_sink_receives_composed_job() {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(RenderConfig::default());
    let receiver = JobReceiver::new(config, Arc::new(PngDirSink::new(dir.path())));

    let job = PrintJob {
        body_text: Some("saved".into()),
        ..Default::default()
    };
    assert!(receiver.print(job).await.unwrap());
    assert!(!receiver.print(PrintJob::default()).await.unwrap());

    let saved: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(saved.len(), 1);
}

// ============================================================================
// BOT SIDE
// ============================================================================

#[tokio::test]
async fn test_mention_with_link_and_photo() {
    let config = Arc::new(RenderConfig::builtin(PrinterConfig::NARROW_58MM));
    let files = HashMap::from([("https://cdn/photo.png".to_string(), png_of(200, 100, 0))]);
    let builder = JobBuilder::new(
        config.clone(),
        HashSet::from([1000]),
        Arc::new(StaticTitles::new([("https://example.com/", "Example Domain")])),
        Arc::new(MapFetcher(files)),
    );

    let event = ChatEvent {
        message_id: 1,
        sender_id: 7,
        sender_name: "alice".into(),
        content: "<@1000> look https://example.com/".into(),
        attachments: vec![Attachment {
            filename: "photo.png".into(),
            url: "https://cdn/photo.png".into(),
            content_type: Some("image/png".into()),
        }],
        origin: Origin::Guild {
            server: "Makers".into(),
            channel: "general".into(),
            mentioned_ids: vec![1000],
            reply_to_author: None,
        },
    };

    let spec = builder.handle(&event).unwrap();
    let print_job = builder.build(spec).await.unwrap();
    assert_eq!(print_job.body_text.as_deref(), Some("look [Example Domain]"));
    assert_eq!(print_job.body_images.len(), 1);
    assert!(matches!(print_job.footer, Some(Part::Image(_))));

    let img = job::compose(&print_job, &config).unwrap();
    assert_eq!(img.width(), 384);
    // Header, body, photo and QR footer all contribute height
    assert!(img.height() > 100 + 100);
}

#[test]
fn test_footer_for_several_links_stacks_codes() {
    let config = Arc::new(RenderConfig::builtin(PrinterConfig::NARROW_58MM));
    let builder = JobBuilder::new(
        config,
        HashSet::from([1]),
        Arc::new(StaticTitles::new(Vec::<(String, String)>::new())),
        Arc::new(MapFetcher(HashMap::new())),
    );

    let one = vec![UrlRef {
        url: "https://a.example".into(),
        label: "a".into(),
    }];
    let two = vec![
        one[0].clone(),
        UrlRef {
            url: "https://b.example".into(),
            label: "b".into(),
        },
    ];

    let single = compositor::image_from_bytes(&builder.render_footer(&one).unwrap().unwrap()).unwrap();
    let double = compositor::image_from_bytes(&builder.render_footer(&two).unwrap().unwrap()).unwrap();
    assert_eq!(single.width(), 384);
    assert!(double.height() > single.height());
    assert!(builder.render_footer(&[]).unwrap().is_none());
}

// ============================================================================
// RELAY
// ============================================================================

#[tokio::test]
async fn test_repeated_dm_greets_once_and_prints_twice() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(IdLedger::open(dir.path().join("greeted.json")).await.unwrap());
    let greeter = Arc::new(RecordingGreeter::default());
    let dispatch = Arc::new(RecordingDispatch::default());
    let relay = Relay::new(offline_builder(HashSet::from([1000])), dispatch.clone())
        .with_greeting(ledger.clone(), greeter.clone());

    let event = ChatEvent {
        message_id: 1,
        sender_id: 42,
        sender_name: "bob".into(),
        content: "hi there".into(),
        attachments: vec![],
        origin: Origin::DirectMessage,
    };
    assert!(relay.on_event(&event).await);
    assert!(relay.on_event(&event).await);

    assert_eq!(*greeter.greeted.lock().unwrap(), vec![42]);
    assert!(ledger.contains(42).await);
    assert_eq!(dispatch.jobs.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_guild_message_is_not_greeted() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(IdLedger::open(dir.path().join("greeted.json")).await.unwrap());
    let greeter = Arc::new(RecordingGreeter::default());
    let dispatch = Arc::new(RecordingDispatch::default());
    let relay = Relay::new(offline_builder(HashSet::from([1000])), dispatch.clone())
        .with_greeting(ledger, greeter.clone());

    let event = ChatEvent {
        message_id: 2,
        sender_id: 42,
        sender_name: "bob".into(),
        content: "<@1000> ping".into(),
        attachments: vec![],
        origin: Origin::Guild {
            server: "Makers".into(),
            channel: "general".into(),
            mentioned_ids: vec![1000],
            reply_to_author: None,
        },
    };
    assert!(relay.on_event(&event).await);
    assert!(greeter.greeted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_row_does_not_stop_later_rows() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = IdLedger::open(dir.path().join("rows.json")).await.unwrap();
    let dispatch = Arc::new(RecordingDispatch {
        failures: 1,
        ..Default::default()
    });
    let relay = Relay::new(offline_builder(HashSet::new()), dispatch.clone());

    let rows = vec![
        SheetRow { index: 2, text: "first answer".into() },
        SheetRow { index: 3, text: "second answer".into() },
    ];
    assert_eq!(relay.print_new_rows(&rows, &ledger).await, 1);
    assert!(!ledger.contains(2).await);
    assert!(ledger.contains(3).await);

    // Next poll retries the failed row only
    assert_eq!(relay.print_new_rows(&rows, &ledger).await, 1);
    assert!(ledger.contains(2).await);
    assert_eq!(dispatch.jobs.lock().unwrap().len(), 2);
}

// ============================================================================
// LEDGER
// ============================================================================

#[tokio::test]
async fn test_greeting_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("greeted.json");
    let greeter = RecordingGreeter::default();

    let ledger = IdLedger::open(&path).await.unwrap();
    assert!(ledger.greet_if_new(42, &greeter).await.unwrap());
    assert!(!ledger.greet_if_new(42, &greeter).await.unwrap());
    drop(ledger);

    let reopened = IdLedger::open(&path).await.unwrap();
    assert!(reopened.contains(42).await);
    assert!(!reopened.greet_if_new(42, &greeter).await.unwrap());
    assert_eq!(*greeter.greeted.lock().unwrap(), vec![42]);
}
