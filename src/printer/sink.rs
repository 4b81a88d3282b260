//! Where composed jobs end up.
//!
//! - [`NetworkPrinter`]: dithers the job and streams raster commands to a
//!   printer's raw TCP port (9100).
//! - [`PngDirSink`]: writes each job as a timestamped PNG, for setups
//!   without a printer attached.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use image::GrayImage;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::commands::{self, Dialect};
use super::config::PrinterConfig;
use crate::error::{Result, TegamiError};
use crate::render::compositor;
use crate::render::dither::{self, DitheringAlgorithm};

/// Raw TCP print port (JetDirect).
pub const RAW_PORT: u16 = 9100;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bytes written per `write_all` call.
const CHUNK_SIZE: usize = 8192;

/// Accepts composed jobs for output.
#[async_trait]
pub trait PrintSink: Send + Sync {
    async fn print(&self, job: &GrayImage) -> Result<()>;
}

/// A receipt printer reachable over raw TCP.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    pub addr: String,
    pub printer: PrinterConfig,
    pub dialect: Dialect,
    pub dithering: DitheringAlgorithm,
}

impl NetworkPrinter {
    pub fn new(addr: impl Into<String>, printer: PrinterConfig) -> Self {
        Self {
            addr: addr.into(),
            printer,
            dialect: Dialect::default(),
            dithering: DitheringAlgorithm::default(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_dithering(mut self, dithering: DitheringAlgorithm) -> Self {
        self.dithering = dithering;
        self
    }

    /// Encode a job into the printer's command stream.
    pub fn encode(&self, job: &GrayImage) -> Vec<u8> {
        if job.width() != self.printer.width_dots as u32 {
            warn!(
                width = job.width(),
                paper = self.printer.width_dots,
                "job width differs from paper width"
            );
        }
        let width_bytes = job.width().div_ceil(8) as u16;
        let rows = dither::to_raster(job, self.dithering);
        commands::print_job(self.dialect, &self.printer, width_bytes, &rows)
    }
}

#[async_trait]
impl PrintSink for NetworkPrinter {
    async fn print(&self, job: &GrayImage) -> Result<()> {
        let sink = self.clone();
        let job = job.clone();
        let bytes = tokio::task::spawn_blocking(move || sink.encode(&job))
            .await
            .map_err(|e| TegamiError::Transport(format!("Raster encoding task failed: {}", e)))?;

        info!(addr = %self.addr, total = bytes.len(), "sending job to printer");
        let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| {
                TegamiError::Transport(format!(
                    "Connection to printer {} timed out after {}s",
                    self.addr,
                    CONNECT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| TegamiError::Transport(format!("Connect to printer {}: {}", self.addr, e)))?;

        let mut sent = 0;
        for chunk in bytes.chunks(CHUNK_SIZE) {
            stream.write_all(chunk).await.map_err(|e| {
                TegamiError::Transport(format!("Printer send failed at byte {}: {}", sent, e))
            })?;
            sent += chunk.len();
            debug!(sent, total = bytes.len(), "printer progress");
        }
        stream
            .shutdown()
            .await
            .map_err(|e| TegamiError::Transport(format!("Printer shutdown: {}", e)))?;

        info!(addr = %self.addr, "job printed");
        Ok(())
    }
}

/// Saves every job as `tegami_<timestamp>.png` in a directory.
#[derive(Debug, Clone)]
pub struct PngDirSink {
    dir: PathBuf,
}

impl PngDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl PrintSink for PngDirSink {
    async fn print(&self, job: &GrayImage) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!("tegami_{}.png", Local::now().format("%Y%m%d_%H%M%S_%6f"));
        let path = self.dir.join(name);

        let png = compositor::encode_png(job)?;
        tokio::fs::write(&path, png).await?;
        info!(path = %path.display(), width = job.width(), height = job.height(), "saved job");
        Ok(())
    }
}
