//! Hyper-based HTTP front
//!
//! Direct hyper service with a hand-written router; no framework layer.
//! Request bodies are validated here and only well-formed requests reach
//! the embedding service.

use hyper::body::HttpBody;
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::models::EmbeddingService;
use crate::protocol::http::{EmbeddingRequest, HealthResponse, HttpErrorResponse, RequestError};
use crate::server::config::ServerConfig;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state handed to every request
#[derive(Clone)]
pub struct ServerState {
    pub service: EmbeddingService,
    pub config: Arc<ServerConfig>,
}

impl ServerState {
    pub fn new(service: EmbeddingService, config: Arc<ServerConfig>) -> Self {
        Self { service, config }
    }
}

/// Main request handler
pub async fn handle_request(
    req: Request<Body>,
    state: ServerState,
) -> Result<Response<Body>, Infallible> {
    let request_id = Uuid::new_v4();
    let origin = req
        .headers()
        .get("origin")
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let span = info_span!("request", id = %request_id, method = %method, path = %path);

    let mut response = route(req, &method, &path, &state).instrument(span).await;

    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", origin);
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }

    Ok(response)
}

async fn route(req: Request<Body>, method: &Method, path: &str, state: &ServerState) -> Response<Body> {
    match (method, path) {
        (&Method::POST, "/embed") => handle_embed(req, state).await,
        (&Method::GET, "/health") => handle_health(),
        (&Method::GET, "/") => handle_root(state),
        (&Method::OPTIONS, _) => handle_options(),
        (_, "/embed" | "/health" | "/") => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, HttpErrorResponse::method_not_allowed())
        }
        _ => error_response(StatusCode::NOT_FOUND, HttpErrorResponse::not_found()),
    }
}

/// OPTIONS handler for CORS preflight
fn handle_options() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

/// Liveness; never touches the model
fn handle_health() -> Response<Body> {
    debug!("🏥 Health check requested");
    json_response(StatusCode::OK, &HealthResponse::ok())
}

/// Root endpoint - server info
fn handle_root(state: &ServerState) -> Response<Body> {
    let info = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "embed": {
                "method": "POST",
                "path": "/embed",
                "description": "Embed {\"sentences\": [...]} into one vector per sentence"
            },
            "health": {
                "method": "GET",
                "path": "/health",
                "description": "Liveness check"
            }
        },
        "model": state.service.info(),
        "max_batch_size": state.service.max_batch_size(),
    });

    json_response(StatusCode::OK, &info)
}

/// Embedding endpoint
async fn handle_embed(req: Request<Body>, state: &ServerState) -> Response<Body> {
    let start_time = Instant::now();
    let log_timings = state.config.monitoring.log_request_timings;
    let max_body_bytes = state.config.network.max_body_bytes;

    let declared_length = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_length.is_some_and(|len| len > max_body_bytes) {
        return reject(RequestError::BodyTooLarge {
            limit: max_body_bytes,
        });
    }

    let read_start = Instant::now();
    let body = match read_body(req.into_body(), max_body_bytes).await {
        Ok(body) => body,
        Err(e) => return reject(e),
    };
    log_stage(log_timings, "Body read", read_start.elapsed());

    let parse_start = Instant::now();
    let request = match EmbeddingRequest::from_body(&body, state.service.max_batch_size()) {
        Ok(request) => request,
        Err(e) => return reject(e),
    };
    log_stage(log_timings, "JSON parse", parse_start.elapsed());

    let embed_start = Instant::now();
    let result = state.service.encode(&request.sentences).await;
    log_stage(log_timings, "Embedding generation", embed_start.elapsed());

    match result {
        Ok(embeddings) => {
            let response = json_response(StatusCode::OK, &embeddings);
            log_stage(log_timings, "TOTAL request", start_time.elapsed());
            response
        }
        Err(e) => {
            error!("❌ Embedding generation failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                HttpErrorResponse::internal_error(e.to_string()),
            )
        }
    }
}

/// Collect the body, refusing to buffer more than `limit` bytes
async fn read_body(mut body: Body, limit: usize) -> Result<Vec<u8>, RequestError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| RequestError::BodyRead(e.to_string()))?;
        if bytes.len() + chunk.len() > limit {
            return Err(RequestError::BodyTooLarge { limit });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn log_stage(enabled: bool, stage: &str, elapsed: Duration) {
    if enabled {
        info!("⏱️  {} took: {:?}", stage, elapsed);
    } else {
        debug!("⏱️  {} took: {:?}", stage, elapsed);
    }
}

fn reject(error: RequestError) -> Response<Body> {
    warn!("Rejected request: {}", error);
    error_response(error.status(), HttpErrorResponse::from(&error))
}

/// Helper to create error responses
fn error_response(status: StatusCode, error: HttpErrorResponse) -> Response<Body> {
    json_response(status, &error)
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    let (status, body) = match serde_json::to_vec(value) {
        Ok(body) => (status, body),
        Err(e) => {
            error!("❌ Response serialization failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"Response serialization failed","code":"INTERNAL_ERROR"}"#.to_vec(),
            )
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
