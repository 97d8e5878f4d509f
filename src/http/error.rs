//! Error types and the error envelope stage.
//!
//! Handlers return [`AppError`]. Its `IntoResponse` impl leaves an
//! [`ErrorDetails`] marker in the response extensions; [`error_envelope`]
//! picks it up, logs the failure and renders the final JSON body with the
//! request's correlation id.

use std::any::Any;
use std::error::Error as StdError;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::config::Environment;
use crate::http::correlation::RequestContext;
use crate::observability::Logger;
use crate::store::StoreError;
use crate::SERVICE_NAME;

const UNKNOWN_CORRELATION: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("Database operation failed")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),

    #[error("Internal Server Error")]
    Panic(String),
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Status { status, .. } => *status,
            AppError::Store(_) | AppError::Internal(_) | AppError::Panic(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The error and its source chain, one cause per line.
    pub fn trace(&self) -> String {
        let mut trace = format!("{:?}", self);
        let mut source = self.source();
        while let Some(cause) = source {
            trace.push_str("\n  caused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        trace
    }
}

/// What the envelope stage needs to render a failure.
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub status: StatusCode,
    pub message: String,
    pub trace: String,
}

impl From<&AppError> for ErrorDetails {
    fn from(err: &AppError) -> Self {
        Self {
            status: err.status_code(),
            message: err.to_string(),
            trace: err.trace(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub status_code: u16,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(details: &ErrorDetails, correlation_id: &str, stack: Option<String>) -> Self {
        Self {
            error: ErrorBody {
                message: details.message.clone(),
                status_code: details.status.as_u16(),
                correlation_id: correlation_id.to_string(),
                stack,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let details = ErrorDetails::from(&self);
        // Replaced by the envelope stage when it runs.
        let body = ErrorEnvelope::new(&details, UNKNOWN_CORRELATION, None);
        let mut response = (details.status, Json(body)).into_response();
        response.extensions_mut().insert(details);
        response
    }
}

/// Pipeline stage that turns any [`AppError`] raised downstream into the
/// client-facing envelope. `stack` is only exposed outside production.
pub async fn error_envelope(
    State(environment): State<Environment>,
    req: Request,
    next: Next,
) -> Response {
    let ctx = req.extensions().get::<RequestContext>().cloned();
    let method = req.method().clone();
    let url = req.uri().to_string();

    let response = next.run(req).await;

    let Some(details) = response.extensions().get::<ErrorDetails>().cloned() else {
        return response;
    };

    let (correlation_id, logger) = match ctx {
        Some(ctx) => (ctx.correlation_id.to_string(), ctx.logger),
        None => (
            UNKNOWN_CORRELATION.to_string(),
            Logger::service(SERVICE_NAME),
        ),
    };
    logger.error(
        "Request error",
        json!({
            "error": details.message,
            "stack": details.trace,
            "status_code": details.status.as_u16(),
            "method": method.as_str(),
            "url": url,
        }),
    );

    let stack = (!environment.is_production()).then(|| details.trace.clone());
    let envelope = ErrorEnvelope::new(&details, &correlation_id, stack);
    let (mut parts, _) = response.into_parts();
    match serde_json::to_vec(&envelope) {
        Ok(bytes) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode error envelope");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Handler for `CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let payload = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Panic(payload).into_response()
}
