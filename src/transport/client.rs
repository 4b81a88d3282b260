//! Job sender: the bot side of the link.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::codec;
use crate::error::{Result, TegamiError};
use crate::job::PrintJob;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Hands a finished job to whatever prints it.
#[async_trait]
pub trait JobDispatch: Send + Sync {
    async fn dispatch(&self, job: &PrintJob) -> Result<()>;
}

/// Sends jobs to a receiver, one connection per job.
///
/// There is no retry and no queue: a failed send is reported to the caller
/// and the job is gone.
#[derive(Debug, Clone)]
pub struct JobSender {
    addr: String,
}

impl JobSender {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn send(&self, job: &PrintJob) -> Result<()> {
        let frame = codec::encode(job)?;
        debug!(addr = %self.addr, size = frame.len(), "connecting to receiver");

        let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| {
                TegamiError::Transport(format!(
                    "Connection to {} timed out after {}s",
                    self.addr,
                    CONNECT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| TegamiError::Transport(format!("Connect to {}: {}", self.addr, e)))?;

        stream
            .write_all(&frame)
            .await
            .map_err(|e| TegamiError::Transport(format!("Send to {}: {}", self.addr, e)))?;
        stream
            .shutdown()
            .await
            .map_err(|e| TegamiError::Transport(format!("Shutdown {}: {}", self.addr, e)))?;

        info!(addr = %self.addr, size = frame.len(), "job sent");
        Ok(())
    }
}

#[async_trait]
impl JobDispatch for JobSender {
    async fn dispatch(&self, job: &PrintJob) -> Result<()> {
        self.send(job).await
    }
}
