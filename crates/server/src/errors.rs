//! HTTP error taxonomy.
//!
//! Handlers return [`ApiError`]. Its response carries an [`ErrorReport`]
//! extension and no body; [`render_errors`] turns the report into a body in
//! the negotiated format and applies environment masking.

use std::any::Any;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use northwind_core::config::{Environment, XmlFlavor};
use northwind_core::{ApplicationError, DomainError, ValidationErrors};
use northwind_db::RepositoryError;

use crate::formatters::{self, xml, Representation, XmlError};
use crate::state::AppState;

const MASKED_MESSAGE: &str = "An unexpected internal error occurred.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            Self::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn report(self) -> ErrorReport {
        let (status, code) = self.status_and_code();
        let diagnostic = self.to_string();
        let (message, details) = match self {
            Self::BadRequest(message)
            | Self::UnsupportedMediaType(message)
            | Self::NotFound(message)
            | Self::MethodNotAllowed(message) => (message, None),
            Self::Validation(errors) => {
                ("One or more validation errors occurred.".to_string(), Some(errors))
            }
            Self::Persistence(_) | Self::Internal(_) => (MASKED_MESSAGE.to_string(), None),
        };

        ErrorReport { status, code, message, details, diagnostic }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(DomainError::Validation(errors)) => Self::Validation(errors),
            ApplicationError::Domain(mismatch @ DomainError::IdentifierMismatch { .. }) => {
                Self::BadRequest(mismatch.to_string())
            }
            not_found @ ApplicationError::NotFound { .. } => Self::NotFound(not_found.to_string()),
            ApplicationError::Persistence(message) => Self::Persistence(message),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, _) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(event_name = "http.error", error = %self, "request failed");
        } else {
            tracing::debug!(event_name = "http.rejected", error = %self, "request rejected");
        }

        let mut response = status.into_response();
        response.extensions_mut().insert(self.report());
        response
    }
}

/// Error outcome waiting to be rendered by [`render_errors`].
#[derive(Clone, Debug)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<ValidationErrors>,
    pub diagnostic: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable code such as `NOT_FOUND` or `VALIDATION_ERROR`.
    pub code: String,
    pub message: String,
    /// Offending fields and their messages, for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<ValidationErrors>,
    /// Underlying cause. Only present in the development environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ErrorBody {
    pub fn from_report(report: ErrorReport, environment: Environment) -> Self {
        let ErrorReport { status, code, message, details, diagnostic } = report;

        let detail = if environment.is_development() {
            ErrorDetail { code: code.to_string(), message, details, diagnostic: Some(diagnostic) }
        } else if status.is_server_error() {
            ErrorDetail {
                code: code.to_string(),
                message: MASKED_MESSAGE.to_string(),
                details: None,
                diagnostic: None,
            }
        } else {
            ErrorDetail { code: code.to_string(), message, details, diagnostic: None }
        };

        Self { error: detail }
    }
}

impl Representation for ErrorBody {
    fn to_xml(&self, _flavor: XmlFlavor) -> Result<String, XmlError> {
        xml::encode_error(&self.error)
    }
}

/// Renders any [`ErrorReport`] left on the response by inner layers.
pub async fn render_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let format = formatters::negotiate_headers(request.headers(), state.preferred_xml());
    let mut response = next.run(request).await;

    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };

    let body = ErrorBody::from_report(report, state.config.environment);
    let bytes = match body.render(format) {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(event_name = "http.error", error = %error, "could not render error body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts.headers.insert(CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
    Response::from_parts(parts, Body::from(bytes))
}

/// Response for a handler panic; rendered afterwards like any other error.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    };

    ApiError::Internal(format!("panic: {message}")).into_response()
}
