//! # HTTP Preview Server
//!
//! Renders jobs to PNG without touching paper, and accepts jobs over HTTP
//! as an alternative to the TCP link.
//!
//! ## Usage
//!
//! ```bash
//! tegami serve --listen 0.0.0.0:5000 --http 0.0.0.0:8080 --png-dir ./out
//! ```
//!
//! ## Routes
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | GET | `/api/health` | | `{"status": "ok"}` |
//! | POST | `/api/job/preview` | wire job JSON | PNG |
//! | POST | `/api/job/print` | wire job JSON | `{"success": ...}` |
//! | POST | `/api/chat/preview` | chat event JSON | PNG (204 if ignored) |
//! | POST | `/api/summarize` | `{"text": ..., "options"?: ...}` | summary JSON |

mod handlers;
mod state;

pub use state::{AppState, ServerConfig};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Result, TegamiError};

/// Upload limit; jobs carry base64 photos.
const BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Build the router. Split from [`serve`] so tests can drive it directly.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/job/preview", post(handlers::job::preview))
        .route("/api/job/print", post(handlers::job::print))
        .route("/api/chat/preview", post(handlers::job::chat_preview))
        .route("/api/summarize", post(handlers::text::summarize_text))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: ServerConfig, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            TegamiError::Transport(format!("Failed to bind to {}: {}", config.listen_addr, e))
        })?;
    info!(addr = %config.listen_addr, "preview server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| TegamiError::Transport(format!("Server error: {}", e)))?;

    Ok(())
}
