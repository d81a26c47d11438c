//! Gateway error taxonomy and its canonical JSON rendering.
//!
//! Every error the gateway can hand back to a client is one of the ten kinds
//! below. [`GatewayError`] implements [`actix_web::ResponseError`] so a
//! handler can simply propagate `?` and let this module render the response;
//! it never leaks upstream-internal detail beyond what each variant's
//! `message` already carries.

use actix_web::{http::StatusCode, HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("route not found for {method} {path}")]
    NotFound { method: String, path: String },

    #[error("payload too large: {0} bytes exceeds limit")]
    PayloadTooLarge(usize),

    #[error("rate limit exceeded for policy '{policy}'")]
    TooManyRequests { policy: String, retry_after_secs: u64 },

    #[error("bad gateway: upstream '{upstream}' returned an invalid response")]
    BadGateway { upstream: String },

    #[error("service unavailable: upstream '{upstream}' circuit is open")]
    ServiceUnavailable { upstream: String },

    #[error("gateway timeout contacting upstream '{upstream}'")]
    GatewayTimeout { upstream: String },

    #[error("internal gateway error: {0}")]
    Internal(String),
}

/// Stable machine-readable error identifiers, distinct from the HTTP status.
impl GatewayError {
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::Forbidden => "forbidden",
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::PayloadTooLarge(_) => "payload_too_large",
            GatewayError::TooManyRequests { .. } => "too_many_requests",
            GatewayError::BadGateway { .. } => "bad_gateway",
            GatewayError::ServiceUnavailable { .. } => "service_unavailable",
            GatewayError::GatewayTimeout { .. } => "gateway_timeout",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            GatewayError::ServiceUnavailable { .. } => Some("CIRCUIT_OPEN"),
            GatewayError::TooManyRequests { .. } => Some("RATE_LIMITED"),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GatewayError::BadGateway { upstream }
            | GatewayError::ServiceUnavailable { upstream }
            | GatewayError::GatewayTimeout { upstream } => {
                Some(serde_json::json!({ "upstream": upstream }))
            }
            _ => None,
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Edge rendering without request context (method/path/correlation id);
        // pipeline::ingress always prefers `to_error_document` over this path.
        let doc = ErrorDocument {
            status_code: self.status_code().as_u16(),
            error_type: self.error_type(),
            message: self.to_string(),
            details: self.details(),
            error_code: self.error_code(),
            correlation_id: "unknown".to_string(),
            timestamp: chrono::Utc::now(),
            path: String::new(),
            method: String::new(),
        };
        let mut builder = HttpResponse::build(self.status_code());
        if let GatewayError::TooManyRequests { retry_after_secs, .. } = self {
            builder.insert_header(("Retry-After", retry_after_secs.to_string()));
        }
        builder.json(doc)
    }
}

/// The canonical JSON error document rendered for every handled error.
#[derive(Debug, Serialize)]
pub struct ErrorDocument {
    pub status_code: u16,
    pub error_type: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub path: String,
    pub method: String,
}

impl GatewayError {
    /// Renders the canonical error document with full request context, the
    /// way the ingress pipeline should always produce responses.
    pub fn to_error_document(&self, correlation_id: &str, method: &str, path: &str) -> ErrorDocument {
        ErrorDocument {
            status_code: self.status_code().as_u16(),
            error_type: self.error_type(),
            message: self.to_string(),
            details: self.details(),
            error_code: self.error_code(),
            correlation_id: correlation_id.to_string(),
            timestamp: chrono::Utc::now(),
            path: path.to_string(),
            method: method.to_string(),
        }
    }

    pub fn to_http_response(&self, req: &HttpRequest, correlation_id: &str) -> HttpResponse {
        let doc = self.to_error_document(correlation_id, req.method().as_str(), req.path());
        let mut builder = HttpResponse::build(self.status_code());
        builder.insert_header(("X-Correlation-ID", correlation_id));
        if let GatewayError::TooManyRequests { retry_after_secs, .. } = self {
            builder.insert_header(("Retry-After", retry_after_secs.to_string()));
        }
        builder.json(doc)
    }
}
