//! HTTP front end
//!
//! Thin transport around [`Classifier::detect_text`]: request validation,
//! JSON encoding, and moving the blocking core off the async runtime.

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument, Span};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::vision::Classifier;

const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

#[derive(Clone)]
struct AppState {
    classifier: Arc<Classifier>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Build the service router
pub fn build_router(classifier: Arc<Classifier>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/classify", any(classify))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(AppState { classifier })
}

/// Bind and serve until Ctrl-C
pub async fn serve(classifier: Arc<Classifier>, config: &ServerConfig) -> Result<()> {
    let app = build_router(classifier, config.max_body_bytes);
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    info!("Starting server on {}...", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn classify(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    handle_classify(state, method, headers, body)
        .instrument(info_span!("classify", %request_id))
        .await
}

async fn handle_classify(
    state: AppState,
    method: Method,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    if method != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed, use POST");
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(media_type);
    if !content_type.is_some_and(|ct| ACCEPTED_CONTENT_TYPES.contains(&ct.as_str())) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "content-type must be image/jpeg or image/png",
        );
    }

    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "image too large");
        }
        Err(rejection) => {
            error!("Failed to read request body: {}", rejection);
            return error_response(StatusCode::BAD_REQUEST, "failed to read image data");
        }
    };

    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty image data");
    }

    info!("Classifying {} byte image", body.len());
    let classifier = Arc::clone(&state.classifier);
    let span = Span::current();
    let outcome = tokio::task::spawn_blocking(move || span.in_scope(|| classifier.detect_text(&body))).await;

    match outcome {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(e)) => {
            error!("Classification failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to process image")
        }
        Err(e) => {
            error!("Classification task panicked: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to process image")
        }
    }
}

/// Media type without parameters, lowercased (`image/PNG; x=y` -> `image/png`)
fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PreprocessConfig, SearchConfig};
    use crate::error::OcrError;
    use crate::vision::codec::encode_png;
    use crate::vision::{ClassifierResult, OcrEngine, OcrRegion};
    use axum::body::Body;
    use axum::http::Request;
    use image::{GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct FixedEngine {
        confidence: Option<f32>,
        calls: AtomicUsize,
    }

    impl OcrEngine for FixedEngine {
        fn detect(&self, _image_data: &[u8]) -> std::result::Result<Vec<OcrRegion>, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.confidence {
                Some(confidence) => Ok(vec![OcrRegion {
                    x: 4,
                    y: 8,
                    width: 100,
                    height: 20,
                    text: "Invoice 42".to_string(),
                    confidence,
                }]),
                None => Err(OcrError::Engine("engine exploded".to_string())),
            }
        }
    }

    fn router(confidence: Option<f32>) -> (Router, Arc<FixedEngine>) {
        router_with_limit(confidence, 1024 * 1024)
    }

    fn router_with_limit(confidence: Option<f32>, max_body_bytes: usize) -> (Router, Arc<FixedEngine>) {
        let engine = Arc::new(FixedEngine {
            confidence,
            calls: AtomicUsize::new(0),
        });
        let shared: Arc<dyn OcrEngine> = engine.clone();
        let classifier = Classifier::new(shared, PreprocessConfig::default(), SearchConfig::default());
        (build_router(Arc::new(classifier), max_body_bytes), engine)
    }

    fn png_body() -> Vec<u8> {
        encode_png(&GrayImage::from_fn(64, 48, |x, y| Luma([(x + y) as u8]))).unwrap()
    }

    fn classify_request(method: &str, content_type: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri("/classify");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = router(Some(90.0));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_rejects_non_post() {
        let (app, engine) = router(Some(90.0));
        let response = app
            .oneshot(classify_request("GET", Some("image/png"), vec![]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_body(response).await["error"], "method not allowed, use POST");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejects_unsupported_content_type() {
        let (app, _) = router(Some(90.0));
        let response = app
            .oneshot(classify_request("POST", Some("image/gif"), png_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "content-type must be image/jpeg or image/png"
        );
    }

    #[tokio::test]
    async fn test_rejects_missing_content_type() {
        let (app, _) = router(Some(90.0));
        let response = app
            .oneshot(classify_request("POST", None, png_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rejects_empty_body() {
        let (app, engine) = router(Some(90.0));
        let response = app
            .oneshot(classify_request("POST", Some("image/png"), vec![]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "empty image data");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_json_413() {
        let (app, engine) = router_with_limit(Some(90.0), 16);
        let response = app
            .oneshot(classify_request("POST", Some("image/png"), png_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["error"], "image too large");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_classifies_png() {
        let (app, engine) = router(Some(90.0));
        let response = app
            .oneshot(classify_request("POST", Some("image/png; charset=binary"), png_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let result: ClassifierResult = serde_json::from_value(json).unwrap();
        assert_eq!(result.angle, 0);
        assert_eq!(result.scale_factor, 4.0);
        assert_eq!(result.token_count, 9);
        assert_eq!(result.boxes.len(), 1);
        assert_eq!(result.boxes[0].word, "Invoice 42");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_engine_failure_is_generic_500() {
        let (app, _) = router(None);
        let response = app
            .oneshot(classify_request("POST", Some("image/jpeg"), png_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error"], "failed to process image");
        assert!(!json.to_string().contains("exploded"));
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type("image/png"), "image/png");
        assert_eq!(media_type(" Image/JPEG ; q=1"), "image/jpeg");
        assert_eq!(media_type(""), "");
    }
}
