//! # Response Envelope
//!
//! Every response body is one JSON object:
//!
//! ```json
//! {"status": 0, "message": "success", "data": [...]}
//! ```
//!
//! `status` is 0 on success and the taxonomy code otherwise. A successful
//! route may also set headers, a content type, or a raw body that replaces
//! the envelope ([`ResponseOverride`]).

use axum::body::Bytes;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{ApiError, ApiResult};

pub const SUCCESS_MESSAGE: &str = "success";

/// Content type of a raw body when none was set
pub const RAW_BODY_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: u16,
    pub message: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Success envelope carrying the accumulated response fields
    pub fn success(fields: Map<String, Value>) -> Self {
        let mut fields = fields;
        // Action output must not shadow the envelope keys
        fields.remove("status");
        fields.remove("message");
        Self {
            status: 0,
            message: SUCCESS_MESSAGE.to_string(),
            fields,
        }
    }

    /// Error envelope; no action fields
    pub fn error(err: &ApiError) -> Self {
        Self {
            status: err.status().code(),
            message: err.message(),
            fields: Map::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// HTTP status line: 200 on success, otherwise the envelope code
    pub fn http_status(&self) -> StatusCode {
        if self.is_success() {
            StatusCode::OK
        } else {
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }

    pub fn into_value(self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 2);
        map.insert("status".to_string(), Value::from(self.status));
        map.insert("message".to_string(), Value::String(self.message));
        map.extend(self.fields);
        Value::Object(map)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status = self.http_status();
        (status, Json(self.into_value())).into_response()
    }
}

/// Response headers and body set by actions
#[derive(Debug, Clone, Default)]
pub struct ResponseOverride {
    headers: HeaderMap,
    content_type: Option<HeaderValue>,
    body: Option<Bytes>,
}

impl ResponseOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing earlier values of the same name
    pub fn set_header(&mut self, name: &str, value: &str) -> ApiResult<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ApiError::internal(format!("invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ApiError::internal(format!("invalid value for header {}", name)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn set_content_type(&mut self, content_type: &str) -> ApiResult<()> {
        let value = HeaderValue::from_str(content_type)
            .map_err(|_| ApiError::internal(format!("invalid content type: {}", content_type)))?;
        self.content_type = Some(value);
        Ok(())
    }

    /// Send `body` verbatim instead of the JSON envelope
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = Some(body.into());
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_ref().and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.content_type.is_none() && self.body.is_none()
    }
}

/// Envelope plus whatever the route set on the response.
///
/// Failed requests never carry overrides.
#[derive(Debug, Clone)]
pub struct Reply {
    pub envelope: Envelope,
    pub overrides: ResponseOverride,
}

impl Reply {
    pub fn new(envelope: Envelope, overrides: ResponseOverride) -> Self {
        Self {
            envelope,
            overrides,
        }
    }
}

impl From<Envelope> for Reply {
    fn from(envelope: Envelope) -> Self {
        Self::new(envelope, ResponseOverride::new())
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let Reply {
            envelope,
            overrides,
        } = self;
        if !envelope.is_success() {
            return envelope.into_response();
        }

        let ResponseOverride {
            headers,
            content_type,
            body,
        } = overrides;
        let mut response = match body {
            Some(body) => {
                let mut response = (StatusCode::OK, body).into_response();
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(RAW_BODY_CONTENT_TYPE));
                response
            }
            None => envelope.into_response(),
        };
        if let Some(content_type) = content_type {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        response.headers_mut().extend(headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let mut fields = Map::new();
        fields.insert("data".to_string(), json!([1, 2]));
        let envelope = Envelope::success(fields);

        assert_eq!(envelope.http_status(), StatusCode::OK);
        assert_eq!(
            envelope.into_value(),
            json!({"status": 0, "message": "success", "data": [1, 2]})
        );
    }

    #[test]
    fn test_error_envelope() {
        let envelope = Envelope::error(&ApiError::MissingParameter("id".into()));
        assert_eq!(envelope.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"status": 400, "message": "error missing required parameter: id"})
        );
    }

    #[test]
    fn test_override_rejects_invalid_header() {
        let mut overrides = ResponseOverride::new();
        assert!(overrides.set_header("x ok", "1").is_err());
        assert!(overrides.set_header("x-ok", "line\nbreak").is_err());
        assert!(overrides.set_content_type("text/csv").is_ok());
        assert_eq!(overrides.content_type(), Some("text/csv"));
        assert!(overrides.headers().is_empty());
    }

    #[test]
    fn test_raw_body_replaces_envelope() {
        let mut overrides = ResponseOverride::new();
        overrides.set_body("id,title\n1,Dune\n");
        overrides.set_header("Content-Disposition", "attachment").unwrap();

        let response = Reply::new(Envelope::success(Map::new()), overrides).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], RAW_BODY_CONTENT_TYPE);
        assert_eq!(response.headers()["content-disposition"], "attachment");
    }

    #[test]
    fn test_failed_reply_ignores_overrides() {
        let mut overrides = ResponseOverride::new();
        overrides.set_body("raw");
        overrides.set_header("x-trace", "1").unwrap();

        let envelope = Envelope::error(&ApiError::NotFound);
        let response = Reply::new(envelope, overrides).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get("x-trace").is_none());
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }
}
