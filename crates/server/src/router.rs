//! HTTP router construction.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.body_limit_mb.saturating_mul(1024 * 1024);
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health))
        .route("/api/summarize", post(api::summarize))
        .route("/api/answer", post(api::answer))
        .route("/api/visualize", post(api::visualize))
        .route("/api/auto-visualize", post(api::auto_visualize))
        .route("/api/report", post(api::report))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin.trim() == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use insight_core::config::AnalysisConfig;
    use insight_core::Config;
    use insight_llm::{Analyst, LlmError, LlmProvider, ManualClock, Message, ModelSettings};

    use super::*;

    /// Replies with a fixed chart for JSON prompts and fixed prose otherwise.
    struct CannedProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn complete(
            &self,
            messages: Vec<Message>,
            _t: f32,
            _m: u32,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = &messages[0].content;
            if prompt.contains("JSON array") {
                Ok(r#"[{"type": "bar", "title": "Cases by Region", "description": "", "data": {"labels": ["A", "B"], "values": [10, 20]}}]"#.into())
            } else if prompt.contains("JSON object") {
                Ok(r#"{"type": "pie", "title": "Share", "description": "", "data": {"labels": ["A", "B", "C"], "values": [10, 20]}}"#.into())
            } else {
                Ok("Region B reports the most cases.".into())
            }
        }
    }

    /// Never completes.
    struct StalledProvider;

    #[async_trait]
    impl LlmProvider for StalledProvider {
        async fn complete(&self, _m: Vec<Message>, _t: f32, _x: u32) -> Result<String, LlmError> {
            std::future::pending().await
        }
    }

    fn app_with(provider: Arc<dyn LlmProvider>, timeout_secs: u64) -> Router {
        let mut config = Config::for_profile("INSIGHT_ROUTER_TEST");
        config.server.request_timeout_secs = timeout_secs;
        config.server.cors_origin = "*".into();
        let analyst = Analyst::new(
            provider,
            ModelSettings::default(),
            AnalysisConfig::default(),
            Arc::new(ManualClock::default()),
        );
        build_router(Arc::new(AppState { analyst, config }))
    }

    fn app() -> Router {
        app_with(Arc::new(CannedProvider { calls: AtomicUsize::new(0) }), 30)
    }

    fn regions() -> Value {
        json!([
            {"region": "A", "cases": 10},
            {"region": "B", "cases": 20},
            {"region": "C", "cases": 5}
        ])
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_redacted_config() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["status"], "ok");
        assert!(body["config"]["llm"].get("configured").is_some());
        assert!(!body.to_string().contains("api_key"));
    }

    #[tokio::test]
    async fn summarize_returns_model_narrative() {
        let (status, body) = post_json(app(), "/api/summarize", json!({"data": regions()})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "Region B reports the most cases.");
        assert_eq!(body["source"], "model");
    }

    #[tokio::test]
    async fn visualize_returns_truncated_chart() {
        let (status, body) = post_json(
            app(),
            "/api/visualize",
            json!({"request": "share of cases", "data": regions()}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "pie");
        assert_eq!(body["data"]["labels"], json!(["A", "B"]));
        assert_eq!(body["data"]["values"], json!([10.0, 20.0]));
    }

    #[tokio::test]
    async fn auto_visualize_and_report() {
        let (_, body) = post_json(app(), "/api/auto-visualize", json!({"data": regions()})).await;
        assert_eq!(body["charts"].as_array().map(Vec::len), Some(1));

        let (status, body) = post_json(app(), "/api/report", json!({"data": regions()})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["source"], "model");
        assert_eq!(body["charts"][0]["type"], "bar");
    }

    #[tokio::test]
    async fn nested_mapping_is_accepted() {
        let (status, body) = post_json(
            app(),
            "/api/answer",
            json!({"question": "Which region leads?", "data": {"rows": regions()}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "model");
    }

    #[tokio::test]
    async fn deadline_serves_fallback() {
        let app = app_with(Arc::new(StalledProvider), 0);
        let (status, body) = post_json(
            app,
            "/api/visualize",
            json!({"request": "bar chart of cases by region", "data": regions()}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "fallback");
        assert_eq!(body["type"], "bar");
        assert_eq!(body["data"]["labels"], json!(["A", "B", "C"]));
        assert_eq!(body["data"]["values"], json!([10.0, 20.0, 5.0]));
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (status, _) = post_json(app(), "/api/answer", json!({"data": regions()})).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn explicit_cors_origin_is_echoed() {
        let mut config = Config::for_profile("INSIGHT_ROUTER_TEST");
        config.server.cors_origin = "http://localhost:5173".into();
        let analyst = Analyst::new(
            Arc::new(StalledProvider),
            ModelSettings::default(),
            AnalysisConfig::default(),
            Arc::new(ManualClock::default()),
        );
        let response = build_router(Arc::new(AppState { analyst, config }))
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Origin", "http://localhost:5173")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(
            response.headers().get("access-control-allow-origin").map(|v| v.as_bytes()),
            Some(&b"http://localhost:5173"[..])
        );
    }
}
