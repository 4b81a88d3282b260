//! Job receiver: the printer side of the link.
//!
//! ```text
//! accept ──► read until sentinel/EOF ──► decode ──► compose ──► dither ──► sink
//!   │            (per-connection task)              (blocking pool)
//!   └─ loop
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use super::codec::{self, MAX_FRAME_SIZE, SENTINEL};
use crate::config::RenderConfig;
use crate::error::{Result, TegamiError};
use crate::job::{self, PrintJob};
use crate::printer::PrintSink;

const READ_CHUNK: usize = 4096;

/// Accepts jobs over TCP and prints them.
#[derive(Clone)]
pub struct JobReceiver {
    config: Arc<RenderConfig>,
    sink: Arc<dyn PrintSink>,
}

impl JobReceiver {
    pub fn new(config: Arc<RenderConfig>, sink: Arc<dyn PrintSink>) -> Self {
        Self { config, sink }
    }

    /// Accept connections forever, one task per connection.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "receiver listening");
        }
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let receiver = self.clone();
            tokio::spawn(async move {
                if let Err(e) = receiver.handle_connection(stream, peer).await {
                    error!(%peer, error = %e, "job failed");
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        debug!(%peer, "connection accepted");
        let frame = read_frame(&mut stream).await?;
        let job = codec::decode(&frame)?;
        info!(
            %peer,
            size = frame.len(),
            images = job.body_images.len(),
            "job received"
        );
        self.print(job).await?;
        debug!(%peer, "connection closed");
        Ok(())
    }

    /// Compose and print one job. Returns `false` if it had nothing to print.
    pub async fn print(&self, job: PrintJob) -> Result<bool> {
        let config = self.config.clone();
        let composed = tokio::task::spawn_blocking(move || job::compose(&job, &config))
            .await
            .map_err(|e| TegamiError::Image(format!("Composition task failed: {}", e)))?;

        match composed {
            Some(img) => {
                debug!(width = img.width(), height = img.height(), "job composed");
                self.sink.print(&img).await?;
                Ok(true)
            }
            None => {
                info!("job has nothing printable, skipping");
                Ok(false)
            }
        }
    }
}

/// Read one frame: everything up to the sentinel, or to EOF.
///
/// The returned bytes exclude the sentinel.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            debug!(size = buf.len(), "frame ended by EOF");
            return Ok(buf);
        }

        // The sentinel may straddle the previous chunk boundary
        let search_from = buf.len().saturating_sub(SENTINEL.len() - 1);
        buf.extend_from_slice(&chunk[..n]);

        if let Some(pos) = codec::find_sentinel(&buf, search_from) {
            buf.truncate(pos);
            return Ok(buf);
        }
        if buf.len() > MAX_FRAME_SIZE {
            return Err(TegamiError::Codec(format!(
                "Frame exceeds {} bytes without a sentinel",
                MAX_FRAME_SIZE
            )));
        }
    }
}
