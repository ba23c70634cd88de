//! Analysis endpoints.
//!
//! Every handler answers 200 with a typed result. When the per-request
//! deadline passes, the deterministic fallback is served instead.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use insight_core::{DataSample, Narrative, Report, VisualizationConfig};
use insight_llm::fallback;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DataRequest {
    pub data: DataSample,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
    pub data: DataSample,
}

#[derive(Debug, Deserialize)]
pub struct VisualizeRequest {
    pub request: String,
    pub data: DataSample,
}

#[derive(Debug, Serialize)]
pub struct ChartsResponse {
    pub charts: Vec<VisualizationConfig>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub config: serde_json::Value,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        config: state.config.redacted_summary(),
    })
}

/// Await `work` within the configured deadline, else compute `fallback`.
async fn within_deadline<T>(
    state: &AppState,
    label: &str,
    work: impl Future<Output = T>,
    fallback: impl FnOnce() -> T,
) -> T {
    let deadline = state.config.server.request_timeout();
    match tokio::time::timeout(deadline, work).await {
        Ok(value) => value,
        Err(_) => {
            warn!(
                label,
                timeout_secs = deadline.as_secs(),
                "request deadline passed, serving fallback"
            );
            fallback()
        }
    }
}

pub async fn summarize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DataRequest>,
) -> Json<Narrative> {
    info!(records = req.data.records().len(), "POST /api/summarize");
    let narrative = within_deadline(&state, "summarize", state.analyst.summarize(&req.data), || {
        fallback::fallback_summary(&req.data.records())
    })
    .await;
    Json(narrative)
}

pub async fn answer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnswerRequest>,
) -> Json<Narrative> {
    info!(question = %req.question, "POST /api/answer");
    let narrative = within_deadline(
        &state,
        "answer",
        state.analyst.answer(&req.question, &req.data),
        || fallback::fallback_answer(&req.question),
    )
    .await;
    Json(narrative)
}

pub async fn visualize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VisualizeRequest>,
) -> Json<VisualizationConfig> {
    info!(request = %req.request, "POST /api/visualize");
    let max_points = state.analyst.config().max_chart_points;
    let config = within_deadline(
        &state,
        "visualize",
        state.analyst.visualize(&req.request, &req.data),
        || fallback::fallback_visualization(&req.request, &req.data.records(), max_points),
    )
    .await;
    Json(config)
}

pub async fn auto_visualize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DataRequest>,
) -> Json<ChartsResponse> {
    info!(records = req.data.records().len(), "POST /api/auto-visualize");
    let analysis = state.analyst.config();
    let charts = within_deadline(
        &state,
        "auto_visualize",
        state.analyst.auto_visualize(&req.data),
        || {
            fallback::fallback_visualizations(
                &req.data.records(),
                analysis.max_fallback_charts,
                analysis.max_chart_points,
            )
        },
    )
    .await;
    Json(ChartsResponse { charts })
}

pub async fn report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DataRequest>,
) -> Json<Report> {
    info!(records = req.data.records().len(), "POST /api/report");
    let analysis = state.analyst.config();
    let report = within_deadline(&state, "report", state.analyst.report(&req.data), || {
        let records = req.data.records();
        Report {
            summary: fallback::fallback_summary(&records),
            charts: fallback::fallback_visualizations(
                &records,
                analysis.max_fallback_charts,
                analysis.max_chart_points,
            ),
        }
    })
    .await;
    Json(report)
}
