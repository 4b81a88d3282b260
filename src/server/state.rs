//! Server state and configuration.

use std::sync::Arc;

use crate::config::RenderConfig;
use crate::job::JobBuilder;
use crate::transport::JobReceiver;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
}

/// Application state shared across handlers.
pub struct AppState {
    pub render: Arc<RenderConfig>,
    pub builder: JobBuilder,
    /// Composes and prints posted jobs, same path as TCP jobs
    pub receiver: JobReceiver,
}

impl AppState {
    pub fn new(render: Arc<RenderConfig>, builder: JobBuilder, receiver: JobReceiver) -> Self {
        Self {
            render,
            builder,
            receiver,
        }
    }
}
