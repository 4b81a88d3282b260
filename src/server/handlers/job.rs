//! Job preview and print handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::job::{self, ChatEvent, PrintJob};
use crate::render::compositor;

use super::super::state::AppState;

type HandlerError = (StatusCode, String);

/// Handle POST /api/job/preview - render a wire job as PNG.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Json(job): Json<PrintJob>,
) -> Result<impl IntoResponse, HandlerError> {
    let png = render_png(&state, job).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// Handle POST /api/job/print - compose a wire job and send it to the sink.
pub async fn print(State(state): State<Arc<AppState>>, Json(job): Json<PrintJob>) -> Response {
    match state.receiver.print(job).await {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({"success": true, "message": "Job printed successfully"})),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"success": false, "error": "Job has nothing to print"})),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "print via HTTP failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": format!("Print failed: {}", e)})),
            )
                .into_response()
        }
    }
}

/// Handle POST /api/chat/preview - run a chat event through the whole
/// pipeline (classify, summarize, download, QR footer, compose) as PNG.
pub async fn chat_preview(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ChatEvent>,
) -> Result<Response, HandlerError> {
    let Some(spec) = state.builder.handle(&event) else {
        return Ok((
            StatusCode::NO_CONTENT,
            "Event is not addressed to a target user",
        )
            .into_response());
    };
    info!(kind = %spec.kind, "previewing chat event");

    let job = state
        .builder
        .build(spec)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Build failed: {}", e)))?;
    let png = render_png(&state, job).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn render_png(state: &AppState, job: PrintJob) -> Result<Vec<u8>, HandlerError> {
    let config = state.render.clone();
    let composed = tokio::task::spawn_blocking(move || job::compose(&job, &config))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task error: {}", e)))?;

    let img = composed.ok_or_else(|| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Job has nothing to print".to_string(),
        )
    })?;

    compositor::encode_png(&img).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Preview render failed: {}", e),
        )
    })
}
