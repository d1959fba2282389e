//! Request view
//!
//! The parts of an HTTP request that actions and middleware read: method,
//! path, headers, the query string and the JSON body.

use std::collections::HashMap;

use axum::extract::Query;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde_json::{Map, Value};

use super::error::{ApiError, ApiResult};
use super::json::get_path;

/// Parsed request
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: HashMap<String, String>,
    body: Value,
}

impl Request {
    /// Empty request for `method` and `path`
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: HashMap::new(),
            body: Value::Object(Map::new()),
        }
    }

    /// Build from raw HTTP parts.
    ///
    /// JSON bodies are parsed (an empty body is `{}`); other content types
    /// leave the body empty. The query string is always parsed.
    pub fn from_parts(
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        body: &[u8],
    ) -> ApiResult<Self> {
        let query = Query::<HashMap<String, String>>::try_from_uri(uri)
            .map(|Query(q)| q)
            .map_err(|e| ApiError::bad_request(format!("invalid query string: {}", e)))?;

        let is_json = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.trim_start().starts_with("application/json"))
            .unwrap_or(false);

        let body = if is_json && !body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_slice(body)?
        } else {
            Value::Object(Map::new())
        };

        Ok(Self {
            method,
            path: uri.path().to_string(),
            headers,
            query,
            body,
        })
    }

    /// Replace the JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Add a query-string parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Resolve a parameter: JSON body (dotted path) first, then the query
    /// string. Null counts as absent.
    pub fn get(&self, name: &str) -> Option<Value> {
        match get_path(&self.body, name) {
            Some(value) if !value.is_null() => Some(value.clone()),
            _ => self
                .query
                .get(name)
                .map(|v| Value::String(v.clone())),
        }
    }
}
