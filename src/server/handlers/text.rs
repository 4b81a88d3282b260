//! Text summarizer handler.

use axum::{Json, extract::State};
use serde::Deserialize;
use std::sync::Arc;

use crate::text::{Summary, SummaryOptions, TitleResolver, summarize};

use super::super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
    /// Overrides the configured limits
    #[serde(default)]
    pub options: Option<SummaryOptions>,
}

/// Handle POST /api/summarize - show how a message body would print.
pub async fn summarize_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeRequest>,
) -> Json<Summary> {
    let opts = req.options.unwrap_or(state.render.summary);
    let resolver: &dyn TitleResolver = state.builder.resolver();
    Json(summarize(&req.text, &opts, resolver).await)
}
