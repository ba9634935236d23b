//! Response builders shared by the gateway and the admin API.
//!
//! Client-facing errors are JSON `{"msg": "..."}` bodies.

use http::{header, HeaderValue, Response, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::{core::GatewayError, orchestrator::UpstreamResponse};

/// Standard content types
pub mod content_type {
    pub const TEXT_PLAIN: &str = "text/plain; version=0.0.4";
    pub const APPLICATION_JSON: &str = "application/json";
}

pub struct ResponseBuilder;

impl ResponseBuilder {
    pub fn success_http(body: Vec<u8>, content_type: Option<&str>) -> Response<Vec<u8>> {
        Self::with_status(StatusCode::OK, body, content_type)
    }

    pub fn with_status(
        status: StatusCode,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Response<Vec<u8>> {
        let mut builder = Response::builder().status(status);

        if let Some(ct) = content_type {
            match HeaderValue::from_str(ct) {
                Ok(header_value) => {
                    builder = builder.header(header::CONTENT_TYPE, header_value);
                }
                Err(e) => {
                    log::error!("Invalid content type '{}': {}", ct, e);
                }
            }
        }

        builder.body(body).unwrap_or_else(|e| {
            log::error!("Failed to build response: {}", e);
            Self::error_http(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        })
    }

    /// A `{"msg": message}` body with `status`.
    pub fn error_http(status: StatusCode, message: &str) -> Response<Vec<u8>> {
        let body = json!({ "msg": message }).to_string().into_bytes();
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type::APPLICATION_JSON)
            .body(body)
            .unwrap_or_else(|e| {
                log::error!("Failed to build error response: {}", e);
                let mut fallback = Response::new(b"Internal Server Error".to_vec());
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }

    pub fn success_json<T: Serialize>(data: &T) -> Response<Vec<u8>> {
        match serde_json::to_vec(data) {
            Ok(json_body) => Self::success_http(json_body, Some(content_type::APPLICATION_JSON)),
            Err(e) => {
                log::error!("Failed to serialize JSON response: {}", e);
                Self::error_http(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "JSON serialization failed",
                )
            }
        }
    }

    pub fn from_error(err: &GatewayError) -> Response<Vec<u8>> {
        Self::error_http(err.status(), err.message())
    }

    /// Relays what the orchestrator answered.
    pub fn from_upstream(upstream: UpstreamResponse) -> Response<Vec<u8>> {
        Self::with_status(
            upstream.status,
            upstream.body.to_vec(),
            upstream.content_type.as_deref(),
        )
    }
}
