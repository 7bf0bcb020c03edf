use axum::{
    Router,
    body::Bytes,
    extract::State,
    middleware,
    response::{IntoResponse, Response},
    routing::post,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::AppState;
use crate::api::auth::require_bearer;
use crate::api::models::{ExtractedContent, ScrapeRequest};
use crate::api::response;
use crate::error::{AppError, Result};

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/v0/scrape", post(scrape_handler))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), require_bearer))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

/// The body is taken raw so malformed JSON gets the same error envelope as
/// every other failure.
async fn scrape_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let start_time = std::time::Instant::now();

    match process_scrape_request(&state, &body).await {
        Ok(content) => {
            info!(
                url = %content.metadata.source_url,
                format = %content.format,
                chars = content.content.len(),
                elapsed = ?start_time.elapsed(),
                "Scrape succeeded"
            );
            response::success(content).into_response()
        }
        Err(err) => {
            warn!(
                status = %err.status_code(),
                error = %err,
                elapsed = ?start_time.elapsed(),
                "Scrape failed"
            );
            err.into_response()
        }
    }
}

async fn process_scrape_request(state: &AppState, body: &[u8]) -> Result<ExtractedContent> {
    let request: ScrapeRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid request body: {}", e)))?;
    let target = request.validate()?;

    info!(url = %target.source_url, format = %target.format, "Processing scrape request");
    let content = state.pipeline.scrape(&target).await?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt; // for `oneshot`

    use crate::api::models::{Metadata, ScrapeTarget};
    use crate::config::{API_KEY_VAR, Config};
    use crate::error::ScrapeError;
    use crate::pipeline::ContentPipeline;

    const TOKEN: &str = "test-token";

    /// Pipeline whose outcome is chosen by the target host.
    #[derive(Default)]
    struct StubPipeline {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentPipeline for StubPipeline {
        async fn scrape(&self, target: &ScrapeTarget) -> std::result::Result<ExtractedContent, ScrapeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match target.url.host_str() {
                Some("missing.test") => Err(ScrapeError::UpstreamHttp {
                    status: 404,
                    url: target.url.to_string(),
                }),
                Some("down.test") => Err(ScrapeError::FetchFailed("connection refused".into())),
                Some("empty.test") => Err(ScrapeError::ExtractionFailed("no main content found".into())),
                Some("broken.test") => Err(ScrapeError::Internal("extraction task failed".into())),
                _ => Ok(ExtractedContent {
                    format: target.format,
                    content: "# Example Domain".to_string(),
                    metadata: Metadata {
                        title: Some("Example Domain".to_string()),
                        language: Some("en".to_string()),
                        description: None,
                        author: None,
                        site_name: None,
                        og_locale_alternate: vec![],
                        source_url: target.source_url.clone(),
                        status_code: 200,
                    },
                }),
            }
        }
    }

    fn test_app() -> (Router, Arc<StubPipeline>) {
        let config = Config::from_lookup(|key| (key == API_KEY_VAR).then(|| TOKEN.to_string()))
            .unwrap();
        let pipeline = Arc::new(StubPipeline::default());
        let state = AppState::with_pipeline(config, pipeline.clone());
        (create_router(state), pipeline)
    }

    fn scrape_request(token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v0/scrape")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn scrape_defaults_to_markdown() {
        let (app, _) = test_app();
        let (status, body) = send(app, scrape_request(Some(TOKEN), r#"{"url":"https://example.com"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["markdown"], "# Example Domain");
        assert_eq!(body["data"]["metadata"]["sourceURL"], "https://example.com");
        assert_eq!(body["data"]["metadata"]["statusCode"], 200);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn payload_key_follows_requested_format() {
        for format in ["html", "txt", "json", "xml", "csv"] {
            let (app, _) = test_app();
            let payload = json!({"url": "https://example.com/a?b=1", "format": format}).to_string();
            let (status, body) = send(app, scrape_request(Some(TOKEN), &payload)).await;

            assert_eq!(status, StatusCode::OK, "format {format}");
            assert!(body["data"][format].is_string(), "format {format}");
            assert!(body["data"].get("markdown").is_none());
            assert_eq!(body["data"]["metadata"]["sourceURL"], "https://example.com/a?b=1");
        }
    }

    #[tokio::test]
    async fn missing_url_is_rejected() {
        for payload in ["{}", r#"{"url":""}"#, r#"{"url":null,"format":"txt"}"#] {
            let (app, pipeline) = test_app();
            let (status, body) = send(app, scrape_request(Some(TOKEN), payload)).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
            assert_eq!(body, json!({"success": false, "error": "URL is required"}));
            assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn malformed_body_and_bad_values_are_400() {
        for payload in ["not json", r#"{"url": 42}"#, r#"{"url":"example.com"}"#, r#"{"url":"https://example.com","format":"pdf"}"#] {
            let (app, _) = test_app();
            let (status, body) = send(app, scrape_request(Some(TOKEN), payload)).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
            assert_eq!(body["success"], false);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn invalid_or_missing_token_is_401_for_any_body() {
        for (token, payload) in [
            (None, r#"{"url":"https://example.com"}"#),
            (Some("wrong"), r#"{"url":"https://example.com"}"#),
            (Some("wrong"), "{}"),
            (Some("wrong"), "garbage"),
        ] {
            let (app, pipeline) = test_app();
            let res = app.oneshot(scrape_request(token, payload)).await.unwrap();

            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(res.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
            assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_401() {
        let (app, _) = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/v0/scrape")
            .header(header::AUTHORIZATION, format!("Basic {TOKEN}"))
            .body(Body::from(r#"{"url":"https://example.com"}"#))
            .unwrap();
        let (status, body) = send(app, req).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or missing token");
    }

    #[tokio::test]
    async fn bearer_scheme_is_case_insensitive() {
        for scheme in ["bearer", "BEARER", "Bearer"] {
            let (app, pipeline) = test_app();
            let req = Request::builder()
                .method("POST")
                .uri("/v0/scrape")
                .header(header::AUTHORIZATION, format!("{scheme} {TOKEN}"))
                .body(Body::from(r#"{"url":"https://example.com"}"#))
                .unwrap();
            let (status, _) = send(app, req).await;

            assert_eq!(status, StatusCode::OK, "scheme {scheme}");
            assert_eq!(pipeline.calls.load(Ordering::SeqCst), 1);
        }

        // The token itself still has to match exactly.
        let (app, _) = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/v0/scrape")
            .header(header::AUTHORIZATION, format!("bearer {}", TOKEN.to_uppercase()))
            .body(Body::from(r#"{"url":"https://example.com"}"#))
            .unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn pipeline_failures_map_to_statuses() {
        let cases = [
            ("https://missing.test/page", StatusCode::BAD_GATEWAY, "HTTP error: "),
            ("https://down.test/", StatusCode::BAD_REQUEST, "Failed to fetch the URL"),
            ("https://empty.test/", StatusCode::BAD_REQUEST, "Failed to extract content"),
            ("https://broken.test/", StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error: "),
        ];

        for (url, expected_status, prefix) in cases {
            let (app, _) = test_app();
            let payload = json!({ "url": url }).to_string();
            let (status, body) = send(app, scrape_request(Some(TOKEN), &payload)).await;

            assert_eq!(status, expected_status, "url {url}");
            assert_eq!(body["success"], false);
            assert!(body.get("data").is_none());
            let error = body["error"].as_str().unwrap();
            assert!(error.starts_with(prefix), "{url}: {error}");
        }
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (app, _) = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/v1/scrape")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
