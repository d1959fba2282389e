//! Core Error Types
//!
//! Unified error handling for the execution pipeline. Every request-time
//! failure is one of these variants; the variant decides the status code
//! and the message surfaced in the response envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use super::response::Envelope;
use crate::db::DbError;

/// Core module result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Status classes surfaced to callers.
///
/// Each carries a fixed numeric code that external callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalError,
    BadGateway,
    ServiceUnavailable,
}

impl Status {
    /// Numeric code written into the envelope's `status` field
    pub fn code(&self) -> u16 {
        match self {
            Status::BadRequest => 400,
            Status::Unauthorized => 401,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::InternalError => 500,
            Status::BadGateway => 502,
            Status::ServiceUnavailable => 503,
        }
    }

    /// Reverse lookup of [`Status::code`]
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            400 => Some(Status::BadRequest),
            401 => Some(Status::Unauthorized),
            403 => Some(Status::Forbidden),
            404 => Some(Status::NotFound),
            500 => Some(Status::InternalError),
            502 => Some(Status::BadGateway),
            503 => Some(Status::ServiceUnavailable),
            _ => None,
        }
    }

    /// HTTP status line for this class
    pub fn http_status(&self) -> StatusCode {
        StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Engine errors
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// A declared parameter could not be resolved from the request
    #[error("error missing required parameter: {0}")]
    MissingParameter(String),

    /// Malformed request body, filter, sort or page clause
    #[error("{0}")]
    BadRequest(String),

    /// Unique-key violation reported by the driver
    #[error("duplicate entry")]
    DuplicateEntry,

    /// Raised by authentication middleware
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// No route matches method + path
    #[error("resource not found")]
    NotFound,

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Driver-level failure; the driver message is only logged
    #[error("error executing query")]
    QueryExecution,

    /// Route or action misconfigured at registration time
    #[error("{0}")]
    Construction(String),

    /// The request transaction could not be opened
    #[error("database connection failed")]
    TransactionUnavailable,

    /// Catch-all, including recovered panics
    #[error("{0}")]
    Internal(String),

    /// Explicit status chosen by a callback
    #[error("{message}")]
    Status { status: Status, message: String },
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a construction error
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an error carrying an explicit status
    pub fn with_status(status: Status, msg: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: msg.into(),
        }
    }

    /// Status class for this error
    pub fn status(&self) -> Status {
        match self {
            // 400 Bad Request
            ApiError::MissingParameter(_) => Status::BadRequest,
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::DuplicateEntry => Status::BadRequest,

            // 401/403
            ApiError::Unauthorized(_) => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,

            // 404 Not Found
            ApiError::NotFound => Status::NotFound,

            // 500 Internal Server Error
            ApiError::QueryExecution => Status::InternalError,
            ApiError::Construction(_) => Status::InternalError,
            ApiError::Internal(_) => Status::InternalError,

            // 503
            ApiError::TransactionUnavailable => Status::ServiceUnavailable,

            ApiError::Status { status, .. } => *status,
        }
    }

    /// Message written into the envelope
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Duplicate(_) => ApiError::DuplicateEntry,
            DbError::Unavailable(_) => ApiError::TransactionUnavailable,
            DbError::Query(_) => ApiError::QueryExecution,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::BadRequest(format!("invalid json body: {}", e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Envelope::error(&self).into_value();
        (status.http_status(), Json(body)).into_response()
    }
}
