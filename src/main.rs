//! # Tegami CLI
//!
//! Command-line entry points for both ends of the relay.
//!
//! ## Usage
//!
//! ```bash
//! # Printer side: accept jobs on :5000 and print to a network printer
//! tegami serve --printer-addr 192.168.1.50
//!
//! # Same, but save PNGs and expose the preview server
//! tegami serve --png-dir ./out --http 0.0.0.0:8080
//!
//! # Bot side: relay chat events (JSON lines on stdin) to the receiver
//! tegami relay --targets 1234,5678 --receiver 10.0.0.2:5000 < events.jsonl
//!
//! # Also greet first-time DM senders (greetings go to stdout as JSON lines)
//! tegami relay --targets 1234 --greeted-ledger greeted_users.json < events.jsonl
//!
//! # Print new spreadsheet rows, skipping rows already printed
//! tegami sheet rows.json --ledger printed_rows.json
//!
//! # Send a one-off job
//! tegami send --header "Hello" --body "Printed from the CLI" --image cat.jpg
//!
//! # Render a job to PNG without printing
//! tegami render --text "hello" --output preview.png
//!
//! # See how a message would be summarized
//! tegami summarize "see https://example.com/some/long/path"
//! ```

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tegami::{
    RenderConfig, TegamiError,
    config::{DEFAULT_RECEIVER_PORT, parse_user_ids},
    job::{self, ChatEvent, HttpAttachmentFetcher, JobBuilder, Part, PrintJob, Relay, SheetRow},
    printer::{Dialect, NetworkPrinter, PngDirSink, PrintSink, PrinterConfig, sink::RAW_PORT},
    render::{compositor, dither::DitheringAlgorithm},
    server::{self, AppState, ServerConfig},
    store::{GreetingSender, IdLedger},
    text::{HttpTitleResolver, NoTitles, SummaryOptions, TitleResolver, summarize},
    transport::{JobReceiver, JobSender},
};

/// Tegami - chat to thermal printer relay
#[derive(Parser, Debug)]
#[command(name = "tegami")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Accept jobs over TCP and print them
    Serve {
        /// Address the job receiver listens on
        #[arg(long, env = "TEGAMI_LISTEN", default_value_t = format!("0.0.0.0:{}", DEFAULT_RECEIVER_PORT))]
        listen: String,

        /// Also start the HTTP preview server on this address
        #[arg(long, env = "TEGAMI_HTTP")]
        http: Option<String>,

        /// Printer address (host or host:port, raw TCP)
        #[arg(long, env = "TEGAMI_PRINTER_ADDR", conflicts_with = "png_dir")]
        printer_addr: Option<String>,

        /// Save jobs as PNGs in this directory instead of printing
        #[arg(long, env = "TEGAMI_PNG_DIR")]
        png_dir: Option<PathBuf>,

        /// Printer command language (star, escpos)
        #[arg(long, env = "TEGAMI_DIALECT", default_value = "star", value_parser = parse_dialect)]
        dialect: Dialect,

        /// Chat user ids whose mentions and replies print (for /api/chat/preview)
        #[arg(long, env = "TEGAMI_TARGETS")]
        targets: Option<String>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Read chat events as JSON lines on stdin and relay them as jobs
    Relay {
        /// Comma-separated chat user ids whose mentions and replies print
        #[arg(long, env = "TEGAMI_TARGETS")]
        targets: String,

        /// Ledger of users already greeted; enables the DM welcome message
        #[arg(long, env = "TEGAMI_GREETED_LEDGER", value_name = "FILE")]
        greeted_ledger: Option<PathBuf>,

        #[command(flatten)]
        receiver: ReceiverArgs,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Send spreadsheet rows that have not been printed yet
    Sheet {
        /// JSON array of rows: [{"index": 2, "text": "..."}, ...]
        rows: PathBuf,

        /// Ledger of row numbers already printed
        #[arg(long, env = "TEGAMI_ROW_LEDGER", default_value = "printed_rows.json")]
        ledger: PathBuf,

        #[command(flatten)]
        receiver: ReceiverArgs,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Send a single job to the receiver
    Send {
        /// Header text
        #[arg(long)]
        header: Option<String>,

        /// Body text (sent as-is, not summarized)
        #[arg(long)]
        body: Option<String>,

        /// Image files to attach to the body (repeatable)
        #[arg(long = "image", value_name = "FILE")]
        images: Vec<PathBuf>,

        /// Footer text
        #[arg(long, conflicts_with = "footer_image")]
        footer: Option<String>,

        /// Footer image file
        #[arg(long, value_name = "FILE")]
        footer_image: Option<PathBuf>,

        #[command(flatten)]
        receiver: ReceiverArgs,
    },

    /// Render a job to PNG without printing
    Render {
        /// Wire job JSON file
        #[arg(long, value_name = "FILE", conflicts_with = "text", required_unless_present = "text")]
        job: Option<PathBuf>,

        /// Render plain text as the job body
        #[arg(long)]
        text: Option<String>,

        /// Output PNG path
        #[arg(long, short, value_name = "FILE", default_value = "tegami.png")]
        output: PathBuf,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Show how a message body would be summarized
    Summarize {
        /// Message text
        text: String,

        /// Fetch page titles for links
        #[arg(long)]
        titles: bool,

        /// Maximum characters per line
        #[arg(long, default_value_t = SummaryOptions::default().max_line_length)]
        max_line_length: usize,

        /// Maximum characters of a text span before eliding
        #[arg(long, default_value_t = SummaryOptions::default().max_display_length)]
        max_display_length: usize,

        /// Maximum characters of a link label
        #[arg(long, default_value_t = SummaryOptions::default().url_caption_max_length)]
        url_caption_max_length: usize,
    },
}

/// Rendering options shared by every subcommand that composes bitmaps.
#[derive(Args, Debug)]
struct RenderArgs {
    /// Printer preset (mcp31, 58mm, width:N)
    #[arg(long, env = "TEGAMI_PRINTER", default_value = "mcp31", value_parser = PrinterConfig::parse)]
    printer: PrinterConfig,

    /// TTF/OTF font (falls back to the built-in bitmap font)
    #[arg(long, env = "TEGAMI_FONT", value_name = "FILE")]
    font: Option<PathBuf>,

    /// Dithering algorithm (threshold, bayer, floyd-steinberg)
    #[arg(long, env = "TEGAMI_DITHER", default_value = "floyd-steinberg", value_parser = parse_dither)]
    dither: DitheringAlgorithm,

    /// Rotate tall narrow images to use the full paper width
    #[arg(long)]
    auto_rotate: bool,
}

impl RenderArgs {
    fn to_config(&self) -> RenderConfig {
        RenderConfig {
            dithering: self.dither,
            auto_rotate: self.auto_rotate,
            ..RenderConfig::new(self.printer, self.font.as_deref())
        }
    }
}

#[derive(Args, Debug)]
struct ReceiverArgs {
    /// Receiver address (host:port)
    #[arg(long, env = "TEGAMI_RECEIVER", default_value_t = format!("127.0.0.1:{}", DEFAULT_RECEIVER_PORT))]
    receiver: String,
}

fn parse_dialect(s: &str) -> Result<Dialect, String> {
    Dialect::parse(s).ok_or_else(|| format!("Unknown dialect '{}'. Use 'star' or 'escpos'", s))
}

fn parse_dither(s: &str) -> Result<DitheringAlgorithm, String> {
    DitheringAlgorithm::parse(s).ok_or_else(|| {
        format!(
            "Unknown dithering '{}'. Use 'threshold', 'bayer' or 'floyd-steinberg'",
            s
        )
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), TegamiError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            listen,
            http,
            printer_addr,
            png_dir,
            dialect,
            targets,
            render,
        } => {
            let config = Arc::new(render.to_config());

            let sink: Arc<dyn PrintSink> = match (printer_addr, png_dir) {
                (Some(addr), _) => {
                    let addr = with_default_port(&addr, RAW_PORT);
                    info!(%addr, ?dialect, printer = config.printer.name, "printing to network printer");
                    Arc::new(
                        NetworkPrinter::new(addr, config.printer)
                            .with_dialect(dialect)
                            .with_dithering(config.dithering),
                    )
                }
                (None, Some(dir)) => {
                    info!(dir = %dir.display(), "saving jobs as PNG");
                    Arc::new(PngDirSink::new(dir))
                }
                (None, None) => {
                    return Err(TegamiError::Config(
                        "Either --printer-addr or --png-dir is required".to_string(),
                    ));
                }
            };

            let receiver = JobReceiver::new(config.clone(), sink);
            let listener = TcpListener::bind(&listen)
                .await
                .map_err(|e| TegamiError::Transport(format!("Failed to bind to {}: {}", listen, e)))?;

            match http {
                Some(http_addr) => {
                    let targets = match targets {
                        Some(list) => parse_user_ids(&list)?,
                        None => HashSet::new(),
                    };
                    let builder = http_builder(config.clone(), targets)?;
                    let state = Arc::new(AppState::new(config, builder, receiver.clone()));
                    let server_config = ServerConfig {
                        listen_addr: http_addr,
                    };
                    tokio::try_join!(receiver.serve(listener), server::serve(server_config, state))?;
                }
                None => receiver.serve(listener).await?,
            }
            Ok(())
        }

        Commands::Relay {
            targets,
            greeted_ledger,
            receiver,
            render,
        } => {
            let targets = parse_user_ids(&targets)?;
            let builder = http_builder(Arc::new(render.to_config()), targets)?;
            let mut relay = Relay::new(builder, Arc::new(JobSender::new(receiver.receiver)));
            if let Some(path) = greeted_ledger {
                let ledger = Arc::new(IdLedger::open(path).await?);
                relay = relay.with_greeting(ledger, Arc::new(StdoutGreeter));
            }

            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ChatEvent>(&line) {
                    Ok(event) => {
                        relay.on_event(&event).await;
                    }
                    Err(e) => warn!(error = %e, "skipping malformed event"),
                }
            }
            Ok(())
        }

        Commands::Sheet {
            rows,
            ledger,
            receiver,
            render,
        } => {
            let rows: Vec<SheetRow> = serde_json::from_slice(&tokio::fs::read(&rows).await?)
                .map_err(|e| TegamiError::Config(format!("Invalid rows file {}: {}", rows.display(), e)))?;
            let ledger = IdLedger::open(ledger).await?;
            let builder = http_builder(Arc::new(render.to_config()), HashSet::new())?;
            let relay = Relay::new(builder, Arc::new(JobSender::new(receiver.receiver)));

            let printed = relay.print_new_rows(&rows, &ledger).await;
            println!("Printed {} new row(s) of {}", printed, rows.len());
            Ok(())
        }

        Commands::Send {
            header,
            body,
            images,
            footer,
            footer_image,
            receiver,
        } => {
            let mut body_images = Vec::with_capacity(images.len());
            for path in &images {
                body_images.push(read_file(path).await?);
            }
            let footer = match (footer, footer_image) {
                (Some(text), _) => Some(Part::Text(text)),
                (None, Some(path)) => Some(Part::Image(read_file(&path).await?)),
                (None, None) => None,
            };

            let job = PrintJob {
                header: header.map(Part::Text),
                body_text: body,
                body_images,
                footer,
            };
            if job.is_empty() {
                return Err(TegamiError::Config("Nothing to send".to_string()));
            }

            let sender = JobSender::new(receiver.receiver);
            sender.send(&job).await?;
            println!("Sent job to {}", sender.addr());
            Ok(())
        }

        Commands::Render {
            job: job_file,
            text,
            output,
            render,
        } => {
            let print_job = match (job_file, text) {
                (Some(path), _) => serde_json::from_slice::<PrintJob>(&read_file(&path).await?)
                    .map_err(|e| TegamiError::Codec(format!("Invalid job {}: {}", path.display(), e)))?,
                (None, text) => PrintJob {
                    body_text: text,
                    ..Default::default()
                },
            };

            let config = render.to_config();
            let img = tokio::task::spawn_blocking(move || job::compose(&print_job, &config))
                .await
                .map_err(|e| TegamiError::Image(format!("Render task failed: {}", e)))?
                .ok_or_else(|| TegamiError::Image("Job has nothing to print".to_string()))?;

            tokio::fs::write(&output, compositor::encode_png(&img)?).await?;
            println!(
                "Saved {}x{} preview to {}",
                img.width(),
                img.height(),
                output.display()
            );
            Ok(())
        }

        Commands::Summarize {
            text,
            titles,
            max_line_length,
            max_display_length,
            url_caption_max_length,
        } => {
            let opts = SummaryOptions::new(max_line_length, max_display_length, url_caption_max_length);
            let resolver: Box<dyn TitleResolver> = if titles {
                Box::new(HttpTitleResolver::new()?)
            } else {
                Box::new(NoTitles)
            };

            let summary = summarize(&text, &opts, resolver.as_ref()).await;
            println!("{}", summary.text);
            if !summary.urls.is_empty() {
                println!();
                for url_ref in &summary.urls {
                    println!("  [{}] {}", url_ref.label, url_ref.url);
                }
            }
            Ok(())
        }
    }
}

/// Writes greetings to stdout as JSON lines for the chat bot to deliver.
struct StdoutGreeter;

#[async_trait]
impl GreetingSender for StdoutGreeter {
    async fn send_greeting(&self, user_id: u64, message: &str) -> Result<(), TegamiError> {
        let line = serde_json::json!({"greet": user_id, "message": message});
        println!("{}", line);
        Ok(())
    }
}

/// Job builder that resolves titles and downloads attachments over HTTP.
fn http_builder(config: Arc<RenderConfig>, targets: HashSet<u64>) -> Result<JobBuilder, TegamiError> {
    Ok(JobBuilder::new(
        config,
        targets,
        Arc::new(HttpTitleResolver::new()?),
        Arc::new(HttpAttachmentFetcher::new()?),
    ))
}

async fn read_file(path: &Path) -> Result<Vec<u8>, TegamiError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| TegamiError::Config(format!("Cannot read {}: {}", path.display(), e)))
}

fn with_default_port(addr: &str, port: u16) -> String {
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{}:{}", addr, port)
    }
}
