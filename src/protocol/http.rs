//! HTTP REST API Protocol
//!
//! - `POST /embed` with `{"sentences": ["...", ...]}` answers with a bare
//!   array of vectors `[[0.1, 0.2, ...], ...]`, one per sentence in order.
//! - `GET /health` answers `{"status": "ok"}`.
//!
//! Bodies are checked here, before anything reaches the embedding service.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};

/// Body of `POST /embed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Sentences to embed; order is preserved in the response
    pub sentences: Vec<String>,
}

impl EmbeddingRequest {
    /// Parse and validate a raw request body
    pub fn from_body(body: &[u8], max_sentences: usize) -> Result<Self, RequestError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RequestError::MissingBody);
        }

        let request: EmbeddingRequest = serde_json::from_slice(body).map_err(|e| {
            if e.is_data() {
                RequestError::InvalidShape(e.to_string())
            } else {
                RequestError::MalformedJson(e.to_string())
            }
        })?;

        if request.sentences.len() > max_sentences {
            return Err(RequestError::TooManySentences {
                count: request.sentences.len(),
                max: max_sentences,
            });
        }

        Ok(request)
    }
}

/// Why a request was rejected before encoding
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("Request body is required")]
    MissingBody,

    #[error("Request body is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("Request body does not match {{\"sentences\": [string, ...]}}: {0}")]
    InvalidShape(String),

    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Request has {count} sentences, the limit is {max}")]
    TooManySentences { count: usize, max: usize },

    #[error("Failed to read request body: {0}")]
    BodyRead(String),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::MissingBody | RequestError::InvalidShape(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RequestError::MalformedJson(_) | RequestError::BodyRead(_) => StatusCode::BAD_REQUEST,
            RequestError::BodyTooLarge { .. } | RequestError::TooManySentences { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RequestError::MissingBody => "MISSING_BODY",
            RequestError::MalformedJson(_) => "INVALID_JSON",
            RequestError::InvalidShape(_) => "INVALID_REQUEST",
            RequestError::BodyTooLarge { .. } => "BODY_TOO_LARGE",
            RequestError::TooManySentences { .. } => "TOO_MANY_SENTENCES",
            RequestError::BodyRead(_) => "BODY_READ_FAILED",
        }
    }
}

/// HTTP Error Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error message
    pub error: String,

    /// Error code (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Additional details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HttpErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            details: None,
        }
    }

    /// Create error with code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Create error with details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found() -> Self {
        Self::new("Not Found").with_code("NOT_FOUND")
    }

    pub fn method_not_allowed() -> Self {
        Self::new("Method Not Allowed").with_code("METHOD_NOT_ALLOWED")
    }

    /// Create internal error
    pub fn internal_error(details: impl Into<String>) -> Self {
        Self::new("Internal server error occurred during embedding generation")
            .with_code("INTERNAL_ERROR")
            .with_details(details)
    }
}

impl From<&RequestError> for HttpErrorResponse {
    fn from(error: &RequestError) -> Self {
        HttpErrorResponse::new(error.to_string()).with_code(error.code())
    }
}

/// Health check response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_request() {
        let req = EmbeddingRequest::from_body(br#"{"sentences": ["hello world", ""]}"#, 10).unwrap();
        assert_eq!(req.sentences, vec!["hello world".to_string(), String::new()]);

        let empty = EmbeddingRequest::from_body(br#"{"sentences": []}"#, 10).unwrap();
        assert!(empty.sentences.is_empty());

        // unknown fields are ignored
        let extra = EmbeddingRequest::from_body(br#"{"sentences": ["a"], "model": "x"}"#, 10).unwrap();
        assert_eq!(extra.sentences.len(), 1);
    }

    #[test]
    fn test_shape_errors_are_unprocessable() {
        for body in [
            r#"{"sentences": "not a list"}"#,
            r#"{"sentences": [1, 2]}"#,
            r#"{"texts": ["a"]}"#,
            r#"["a", "b"]"#,
            r#"{"sentences": null}"#,
        ] {
            let err = EmbeddingRequest::from_body(body.as_bytes(), 10).unwrap_err();
            assert!(matches!(err, RequestError::InvalidShape(_)), "{}", body);
            assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn test_missing_and_malformed_bodies() {
        let err = EmbeddingRequest::from_body(b"", 10).unwrap_err();
        assert_eq!(err, RequestError::MissingBody);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            EmbeddingRequest::from_body(b"  \n", 10).unwrap_err(),
            RequestError::MissingBody
        );

        let err = EmbeddingRequest::from_body(br#"{"sentences": ["a""#, 10).unwrap_err();
        assert!(matches!(err, RequestError::MalformedJson(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_too_many_sentences() {
        let err = EmbeddingRequest::from_body(br#"{"sentences": ["a", "b", "c"]}"#, 2).unwrap_err();
        assert_eq!(err, RequestError::TooManySentences { count: 3, max: 2 });
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_error_response() {
        let err = HttpErrorResponse::new("Test error")
            .with_code("TEST_ERROR")
            .with_details("Additional details");

        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, Some("TEST_ERROR".to_string()));
        assert_eq!(err.details, Some("Additional details".to_string()));

        let from_request = HttpErrorResponse::from(&RequestError::MissingBody);
        assert_eq!(from_request.code.as_deref(), Some("MISSING_BODY"));
        let json = serde_json::to_string(&from_request).unwrap();
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_health_response_shape() {
        let json = serde_json::to_value(HealthResponse::ok()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok"}));
    }
}
